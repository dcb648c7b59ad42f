use serde::Deserialize;

use super::ApiError;
use crate::db::VehicleInput;

const FUEL_TYPES: [&str; 6] = ["Gasoline", "Ethanol", "Flex", "Diesel", "Electric", "Hybrid"];
const TRANSMISSIONS: [&str; 4] = ["Manual", "Automatic", "CVT", "Semi-automatic"];
const CATEGORIES: [&str; 7] = [
    "Hatchback",
    "Sedan",
    "SUV",
    "Pickup",
    "Convertible",
    "Wagon",
    "Coupe",
];

#[derive(Debug, Deserialize)]
pub struct VehiclePayload {
    #[serde(default)]
    pub make: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub price: f64,
    pub description: Option<String>,
    pub fuel_type: Option<String>,
    pub transmission: Option<String>,
    pub color: Option<String>,
    #[serde(default)]
    pub mileage: i32,
    pub category: Option<String>,
}

pub fn validate_vehicle_id(id: i32) -> Result<i32, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid vehicle ID: {}. ID must be a positive integer",
            id
        )));
    }
    Ok(id)
}

pub fn validate_vehicle_payload(payload: &VehiclePayload) -> Result<VehicleInput, ApiError> {
    if !(2..=100).contains(&payload.make.chars().count()) {
        return Err(ApiError::validation("Make must be 2 to 100 characters"));
    }

    if !(2..=100).contains(&payload.model.chars().count()) {
        return Err(ApiError::validation("Model must be 2 to 100 characters"));
    }

    if !(1900..=2030).contains(&payload.year) {
        return Err(ApiError::validation("Year must be between 1900 and 2030"));
    }

    if !(0.0..=10_000_000.0).contains(&payload.price) {
        return Err(ApiError::validation(
            "Price must be between 0 and 10,000,000",
        ));
    }

    if let Some(description) = &payload.description {
        if description.chars().count() > 2000 {
            return Err(ApiError::validation(
                "Description must be 2000 characters or less",
            ));
        }
    }

    if let Some(fuel) = &payload.fuel_type {
        if !FUEL_TYPES.contains(&fuel.as_str()) {
            return Err(ApiError::validation(format!(
                "Fuel type must be one of: {}",
                FUEL_TYPES.join(", ")
            )));
        }
    }

    if let Some(transmission) = &payload.transmission {
        if !TRANSMISSIONS.contains(&transmission.as_str()) {
            return Err(ApiError::validation(format!(
                "Transmission must be one of: {}",
                TRANSMISSIONS.join(", ")
            )));
        }
    }

    if let Some(color) = &payload.color {
        if color.chars().count() > 50 {
            return Err(ApiError::validation("Color must be 50 characters or less"));
        }
    }

    if !(0..=1_000_000).contains(&payload.mileage) {
        return Err(ApiError::validation(
            "Mileage must be between 0 and 1,000,000",
        ));
    }

    if let Some(category) = &payload.category {
        if !CATEGORIES.contains(&category.as_str()) {
            return Err(ApiError::validation(format!(
                "Category must be one of: {}",
                CATEGORIES.join(", ")
            )));
        }
    }

    Ok(VehicleInput {
        make: payload.make.clone(),
        model: payload.model.clone(),
        year: payload.year,
        price: payload.price,
        description: payload.description.clone(),
        fuel_type: payload.fuel_type.clone(),
        transmission: payload.transmission.clone(),
        color: payload.color.clone(),
        mileage: payload.mileage,
        category: payload.category.clone(),
    })
}
