pub use super::users::Entity as Users;
pub use super::vehicle_images::Entity as VehicleImages;
pub use super::vehicles::Entity as Vehicles;
