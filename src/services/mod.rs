pub mod documents;
pub mod expenses;
pub mod finance;
pub mod leases;
pub mod payments;
pub mod utility_bills;
