pub mod actor;
pub mod award;
pub mod category;
pub mod ceremony_year;
pub mod film;
pub mod review;
