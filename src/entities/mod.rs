//! sea-orm entity definitions for the freight domain.
//!
//! Status enums live next to the entity that owns them; transition
//! legality is enforced through `crate::workflow`.

pub mod manifest;
pub mod manifest_row;
pub mod package;
pub mod package_status_log;
pub mod service_area;
pub mod shipment;
pub mod shipment_package;
pub mod shipment_status_log;
pub mod user;
pub mod vehicle;
pub mod warehouse;
