//! The known-appliance catalog.

use std::fmt;

/// An appliance the disaggregation model can be asked to predict.
///
/// The catalog is the full set of appliances the model was trained on; the
/// subset actually requested for a household is gated by metadata flags
/// (`metadata[key]` truthy), so the model is never asked about appliances
/// the household does not have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Appliance {
    Kettle,
    Microwave,
    Fridge,
    WashingMachine,
    DishWasher,
    TumbleDryer,
    Oven,
    WaterHeater,
    Computer,
    Bulb,
}

impl Appliance {
    /// Every appliance the model knows about.
    pub const ALL: [Appliance; 10] = [
        Appliance::Kettle,
        Appliance::Microwave,
        Appliance::Fridge,
        Appliance::WashingMachine,
        Appliance::DishWasher,
        Appliance::TumbleDryer,
        Appliance::Oven,
        Appliance::WaterHeater,
        Appliance::Computer,
        Appliance::Bulb,
    ];

    /// The model-facing name (space-separated, as the runner expects it).
    pub fn label(&self) -> &'static str {
        match self {
            Appliance::Kettle => "kettle",
            Appliance::Microwave => "microwave",
            Appliance::Fridge => "fridge",
            Appliance::WashingMachine => "washing machine",
            Appliance::DishWasher => "dish washer",
            Appliance::TumbleDryer => "tumble dryer",
            Appliance::Oven => "oven",
            Appliance::WaterHeater => "water heater",
            Appliance::Computer => "computer",
            Appliance::Bulb => "bulb",
        }
    }

    /// The snake_case key used in metadata flags and output file names.
    pub fn key(&self) -> &'static str {
        match self {
            Appliance::Kettle => "kettle",
            Appliance::Microwave => "microwave",
            Appliance::Fridge => "fridge",
            Appliance::WashingMachine => "washing_machine",
            Appliance::DishWasher => "dish_washer",
            Appliance::TumbleDryer => "tumble_dryer",
            Appliance::Oven => "oven",
            Appliance::WaterHeater => "water_heater",
            Appliance::Computer => "computer",
            Appliance::Bulb => "bulb",
        }
    }

    /// The output column name for this appliance's predictions.
    pub fn pred_column(&self) -> String {
        format!("pred_{}", self.key())
    }

    /// The metadata field holding this appliance's calibration ceiling.
    pub fn scale_key(&self) -> String {
        format!("max_scale_{}", self.key())
    }
}

impl fmt::Display for Appliance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
