pub mod biome;
pub mod composite;
pub mod features;
pub mod mask;
pub mod merge;
pub mod normalize;
pub mod pipeline;
pub mod qa;
pub mod regress;
