// Pricing decision engine: pure, synchronous computations over validated
// samples and a product snapshot.

pub mod curve;
pub mod elasticity;
pub mod optimizer;

pub use curve::ElasticityCurveGenerator;
pub use elasticity::ElasticityEstimator;
pub use optimizer::PriceOptimizer;
