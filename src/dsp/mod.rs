//! Signal-processing primitives: the analysis window, forward MDCT,
//! pre-filters, and transient detector shared by every channel's encode
//! path.

pub mod filter;
pub mod transient;
pub mod window;

pub use filter::{Biquad, ButterworthCascade, OnePole};
pub use transient::TransientDetector;
pub use window::{Mdct, KBD_WINDOW_LEN};
