//! Shared numerics: the realized-volatility estimator feeding the
//! Avellaneda-Stoikov market maker (§4.6.1).

pub mod ewma;
