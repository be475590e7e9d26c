//! Mapping between the flat parameter vector and (attribute, frame) pairs.

use matchmove_core::{AttrRef, Frame};

/// One unknown: an index into the request's attribute list and, for animated
/// attributes, an index into the frame list. `None` marks a static value
/// shared across all frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamEntry {
    pub attr: usize,
    pub frame: Option<usize>,
}

/// Dense index map built once per solve; immutable during iteration.
///
/// Order is deterministic: attributes in input order, animated ones expanded
/// over the frame list in frame order.
#[derive(Debug, Clone, Default)]
pub struct ParameterMap {
    entries: Vec<ParamEntry>,
}

impl ParameterMap {
    pub fn build(attributes: &[AttrRef], frames: &[Frame]) -> Self {
        let mut entries = Vec::new();
        for (attr_idx, attr) in attributes.iter().enumerate() {
            if attr.animated {
                for frame_idx in 0..frames.len() {
                    entries.push(ParamEntry {
                        attr: attr_idx,
                        frame: Some(frame_idx),
                    });
                }
            } else {
                entries.push(ParamEntry {
                    attr: attr_idx,
                    frame: None,
                });
            }
        }
        Self { entries }
    }

    /// Number of unknowns `m`.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, param: usize) -> ParamEntry {
        self.entries[param]
    }

    pub fn entries(&self) -> &[ParamEntry] {
        &self.entries
    }

    /// Frame a parameter resolves to: its tagged frame for animated
    /// attributes, the scene's current frame otherwise.
    pub fn resolve_frame(&self, param: usize, frames: &[Frame], current: Frame) -> Frame {
        match self.entries[param].frame {
            Some(frame_idx) => frames[frame_idx],
            None => current,
        }
    }
}
