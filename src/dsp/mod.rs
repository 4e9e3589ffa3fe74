pub mod biquad;
pub mod chain;
pub mod coefficients;
pub mod compressor;
pub mod cut_filter;
pub mod delay;
pub mod distortion;
pub mod reverb;
pub mod utils;

pub use biquad::Biquad;
pub use chain::ChannelChain;
pub use coefficients::BiquadCoefficients;
pub use compressor::StereoCompressor;
pub use cut_filter::{CutFilterLadder, Slope};
pub use delay::StereoDelay;
pub use reverb::StereoReverb;
