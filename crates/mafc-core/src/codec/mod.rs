//! Binary encode/decode for the `.mref` and `.mrkl` on-disk formats
//! (spec §6.1, §6.2). Little-endian, fixed footer, no external framing
//! crate — the layout is small and fixed enough that a hand-rolled codec
//! is clearer than pulling in a serialization framework for it.

pub mod mref;
pub mod mrkl;
