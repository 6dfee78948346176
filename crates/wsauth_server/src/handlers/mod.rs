pub mod authorizations;
pub mod certificates;
pub mod health;
