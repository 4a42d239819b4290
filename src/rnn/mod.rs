//! # RNN Layers for Sequence Processing
//!
//! [`AutoRegressiveLSTM`] unrolls an
//! [`AutoRegressiveLSTMCell`](crate::cells::AutoRegressiveLSTMCell) across
//! the time axis.
//!
//! ## Tensor Shapes
//!
//! | Tensor | Shape |
//! |--------|-------|
//! | input | `[seq_len, batch, input_size]` (sequence-first) |
//! | initial state | [`RecurrentState`](crate::cells::RecurrentState) with `batch` rows |
//! | output | `[seq_len, batch, num_confounders]` |
//!
//! Unlike the usual zero-initialized layers, the initial state is always
//! supplied by the caller; the factor model seeds it with learned vectors.

pub mod autoregressive_lstm;

pub use autoregressive_lstm::AutoRegressiveLSTM;
