//! Concrete decoders

pub mod symphonia_decoder;

pub use symphonia_decoder::SymphoniaDecoder;
