pub(crate) mod chain;

pub(crate) use chain::Chain;
