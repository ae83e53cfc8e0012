mod decoder;

pub use decoder::ChunkDecoder;
