//! # Recurrent Cells
//!
//! Single-timestep cells. The [`AutoRegressiveLSTM`](crate::rnn::AutoRegressiveLSTM)
//! layer wraps them for sequence processing.
//!
//! ## State
//!
//! [`AutoRegressiveLSTMCell`] threads a [`RecurrentState`] triple through
//! every step:
//!
//! | Tensor | Shape | Description |
//! |--------|-------|-------------|
//! | `input` | `[batch, input_size]` | Observed features at t |
//! | `hidden` | `[batch, hidden_size]` | LSTM hidden state |
//! | `cell` | `[batch, hidden_size]` | LSTM cell state |
//! | `confounder` | `[batch, num_confounders]` | Latent confounder, fed back at t+1 |
//!
//! ```ignore
//! use deconfounder::cells::{AutoRegressiveLSTMCell, RecurrentState};
//!
//! let cell = AutoRegressiveLSTMCell::<Backend>::new(4, 32, 2, &device);
//! let mut state = RecurrentState::zeros(batch, 32, 2, &device);
//! for step in inputs {
//!     state = cell.forward(step, state)?;
//! }
//! ```

pub mod autoregressive_lstm_cell;

pub use autoregressive_lstm_cell::{AutoRegressiveLSTMCell, RecurrentState};
