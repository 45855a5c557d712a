pub mod tokens_codec;
pub mod vbyte;
