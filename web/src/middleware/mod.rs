pub(crate) mod admission;
