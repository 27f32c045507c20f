//! Codec configuration: the default tagging mode for fields that declare
//! neither `$implicit` nor `$explicit`.

use std::sync::atomic::{AtomicU8, Ordering};

/// Tagging mode applied to a context-tagged field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagMode {
    /// The context tag replaces the base type's universal tag.
    Implicit,
    /// The context tag wraps the base type's universal TLV.
    Explicit,
}

/// Per-codec configuration, passed into encode and decode entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecConfig {
    /// Mode for tagged fields that set neither `$implicit` nor `$explicit`.
    pub default_mode: TagMode,
}

impl Default for CodecConfig {
    fn default() -> Self {
        CodecConfig {
            default_mode: TagMode::Explicit,
        }
    }
}

impl CodecConfig {
    pub fn implicit() -> Self {
        CodecConfig {
            default_mode: TagMode::Implicit,
        }
    }

    pub fn explicit() -> Self {
        CodecConfig {
            default_mode: TagMode::Explicit,
        }
    }

    /// The process-wide default set by [`set_default_mode`].
    pub fn global() -> Self {
        if DEFAULT_MODE.load(Ordering::Relaxed) == 1 {
            Self::implicit()
        } else {
            Self::explicit()
        }
    }
}

// 0 = explicit, 1 = implicit. Set once at startup.
static DEFAULT_MODE: AtomicU8 = AtomicU8::new(0);

/// Sets the process-wide default mode returned by [`CodecConfig::global`].
pub fn set_default_mode(mode: TagMode) {
    DEFAULT_MODE.store(matches!(mode, TagMode::Implicit) as u8, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_explicit() {
        assert_eq!(CodecConfig::default().default_mode, TagMode::Explicit);
    }
}
