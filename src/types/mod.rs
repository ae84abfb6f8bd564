pub mod lat_lon;
pub mod model;
pub mod query;
pub mod wind_speed;
