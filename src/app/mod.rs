// Application layer: use-case pipelines built on the domain ports.

pub mod pipelines;
