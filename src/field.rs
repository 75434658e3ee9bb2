//! Known log channels and their metadata.
//!
//! Channel names are a closed set: every column header a recorder can emit
//! (plus the channels this crate derives) is a [`Field`] variant, and
//! anything else parses to [`Field::Unknown`]. Per-field metadata (display
//! order, unit, description, value type) lives in a [`FieldCatalog`] built
//! once from the embedded `field_definitions.json` and passed to whoever needs
//! it.

use std::collections::HashMap;
use std::fmt;

use serde::Deserialize;

use crate::error::FlightLogError;

const BUILTIN_DEFINITIONS: &str = include_str!("field_definitions.json");

macro_rules! fields {
    ($($variant:ident => $name:literal,)*) => {
        /// A recorder channel, keyed by its exact column header text.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Field {
            $($variant,)*
            Unknown,
        }

        impl Field {
            /// Every known field, in declaration order. Excludes `Unknown`.
            pub const ALL: &'static [Field] = &[$(Field::$variant,)*];

            /// Column header text as it appears in the log.
            pub fn name(&self) -> &'static str {
                match self {
                    $(Field::$variant => $name,)*
                    Field::Unknown => "Unknown",
                }
            }
        }
    };
}

fields! {
    LclDate => "Lcl Date",
    LclTime => "Lcl Time",
    UtcOfst => "UTCOfst",
    AtvWpt => "AtvWpt",
    Latitude => "Latitude",
    Longitude => "Longitude",
    AltInd => "AltInd",
    BaroA => "BaroA",
    AltMsl => "AltMSL",
    Oat => "OAT",
    Ias => "IAS",
    GndSpd => "GndSpd",
    VSpd => "VSpd",
    Pitch => "Pitch",
    Roll => "Roll",
    LatAc => "LatAc",
    NormAc => "NormAc",
    Hdg => "HDG",
    Trk => "TRK",
    Volt1 => "volt1",
    Volt2 => "volt2",
    Amp1 => "amp1",
    FQtyL => "FQtyL",
    FQtyR => "FQtyR",
    E1FFlow => "E1 FFlow",
    E1OilT => "E1 OilT",
    E1OilP => "E1 OilP",
    E1Map => "E1 MAP",
    E1Rpm => "E1 RPM",
    E1PctPwr => "E1 %Pwr",
    E1Cht1 => "E1 CHT1",
    E1Cht2 => "E1 CHT2",
    E1Cht3 => "E1 CHT3",
    E1Cht4 => "E1 CHT4",
    E1Cht5 => "E1 CHT5",
    E1Cht6 => "E1 CHT6",
    E1Egt1 => "E1 EGT1",
    E1Egt2 => "E1 EGT2",
    E1Egt3 => "E1 EGT3",
    E1Egt4 => "E1 EGT4",
    E1Egt5 => "E1 EGT5",
    E1Egt6 => "E1 EGT6",
    E1Tit1 => "E1 TIT1",
    E1Tit2 => "E1 TIT2",
    E1Torq => "E1 Torq",
    E1Ng => "E1 NG",
    E1Itt => "E1 ITT",
    E2FFlow => "E2 FFlow",
    E2Map => "E2 MAP",
    E2Rpm => "E2 RPM",
    E2Torq => "E2 Torq",
    E2Ng => "E2 NG",
    E2Itt => "E2 ITT",
    AltGps => "AltGPS",
    Tas => "TAS",
    Hsis => "HSIS",
    Crs => "CRS",
    Nav1 => "NAV1",
    Nav2 => "NAV2",
    Com1 => "COM1",
    Com2 => "COM2",
    Hcdi => "HCDI",
    Vcdi => "VCDI",
    WndSpd => "WndSpd",
    WndDr => "WndDr",
    WptDst => "WptDst",
    WptBrg => "WptBrg",
    MagVar => "MagVar",
    AfcsOn => "AfcsOn",
    RollM => "RollM",
    PitchM => "PitchM",
    RollC => "RollC",
    PichC => "PichC",
    VSpdG => "VSpdG",
    GpsFix => "GPSfix",
    Hal => "HAL",
    Val => "VAL",
    HplWas => "HPLwas",
    HplFd => "HPLfd",
    VplWas => "VPLwas",
    FQtyT => "FQtyT",
    Distance => "Distance",
    WndDirect => "WndDirect",
    WndCross => "WndCross",
    FTotalizerT => "FTotalizerT",
    E1EgtMax => "E1 EGTMax",
    E1EgtMin => "E1 EGTMin",
    E1EgtMaxIdx => "E1 EGTMaxIdx",
    E1ChtMax => "E1 CHTMax",
    E1ChtMin => "E1 CHTMin",
    E1ChtMaxIdx => "E1 CHTMaxIdx",
    FltPhase => "FltPhase",
    LogFileName => "LogFileName",
}

impl Field {
    pub fn from_name(name: &str) -> Option<Field> {
        Field::ALL.iter().copied().find(|f| f.name() == name)
    }

    /// Parse a header, mapping unrecognised names to `Unknown`.
    pub fn from_header(name: &str) -> Field {
        Field::from_name(name).unwrap_or(Field::Unknown)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Keys of the `#airframe_info` metadata line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetaField {
    LogVersion,
    LogContentVersion,
    Product,
    AirframeName,
    UnitSoftwarePartNumber,
    UnitSoftwareVersion,
    SystemSoftwarePartNumber,
    SystemId,
    Mode,
    FlightstreamHeader,
}

impl MetaField {
    pub const ALL: &'static [MetaField] = &[
        MetaField::LogVersion,
        MetaField::LogContentVersion,
        MetaField::Product,
        MetaField::AirframeName,
        MetaField::UnitSoftwarePartNumber,
        MetaField::UnitSoftwareVersion,
        MetaField::SystemSoftwarePartNumber,
        MetaField::SystemId,
        MetaField::Mode,
        MetaField::FlightstreamHeader,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            MetaField::LogVersion => "log_version",
            MetaField::LogContentVersion => "log_content_version",
            MetaField::Product => "Product",
            MetaField::AirframeName => "airframe_name",
            MetaField::UnitSoftwarePartNumber => "unit_software_part_number",
            MetaField::UnitSoftwareVersion => "unit_software_version",
            MetaField::SystemSoftwarePartNumber => "system_software_part_number",
            MetaField::SystemId => "system_id",
            MetaField::Mode => "mode",
            MetaField::FlightstreamHeader => "flightstream_header",
        }
    }

    pub fn from_key(key: &str) -> Option<MetaField> {
        MetaField::ALL.iter().copied().find(|m| m.key() == key)
    }
}

/// How a field's values are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Value,
    Categorical,
    /// Date, time and offset columns; folded into the row timestamp.
    Timestamp,
}

/// Kind of quantity a field holds, for hosts that format values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayKind {
    None,
    Value,
    Coordinate,
    Altitude,
    Pressure,
    Temperature,
    EngineTemperature,
    Speed,
    VerticalSpeed,
    Angle,
    Fuel,
    FuelFlow,
    Percent,
    Frequency,
    Distance,
}

#[derive(Debug, Deserialize)]
struct RawFieldDef {
    field: String,
    order: u32,
    unit: String,
    description: String,
    #[serde(rename = "type")]
    value_type: ValueType,
    kind: DisplayKind,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub field: Field,
    pub order: u32,
    pub unit: String,
    pub description: String,
    pub value_type: ValueType,
    pub kind: DisplayKind,
}

/// Immutable field metadata table.
#[derive(Debug, Clone, Default)]
pub struct FieldCatalog {
    defs: HashMap<Field, FieldDef>,
}

impl FieldCatalog {
    /// Catalog built from the definitions shipped with the crate.
    pub fn builtin() -> Self {
        match Self::from_json(BUILTIN_DEFINITIONS) {
            Ok(catalog) => catalog,
            Err(err) => {
                tracing::error!(%err, "failed to decode builtin field definitions");
                Self::default()
            }
        }
    }

    pub fn from_json(json: &str) -> Result<Self, FlightLogError> {
        let raw: Vec<RawFieldDef> = serde_json::from_str(json)
            .map_err(|e| FlightLogError::InvalidConfig(format!("field definitions: {e}")))?;

        let mut defs = HashMap::with_capacity(raw.len());
        for def in raw {
            match Field::from_name(&def.field) {
                Some(field) => {
                    defs.insert(
                        field,
                        FieldDef {
                            field,
                            order: def.order,
                            unit: def.unit,
                            description: def.description,
                            value_type: def.value_type,
                            kind: def.kind,
                        },
                    );
                }
                None => tracing::warn!(field = %def.field, "incompatible field definition"),
            }
        }
        Ok(Self { defs })
    }

    pub fn get(&self, field: Field) -> Option<&FieldDef> {
        self.defs.get(&field)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    pub fn value_type(&self, field: Field) -> ValueType {
        self.defs
            .get(&field)
            .map(|d| d.value_type)
            .unwrap_or(ValueType::Value)
    }

    pub fn order(&self, field: Field) -> u32 {
        self.defs.get(&field).map(|d| d.order).unwrap_or(9999)
    }

    pub fn unit(&self, field: Field) -> &str {
        self.defs.get(&field).map(|d| d.unit.as_str()).unwrap_or("")
    }
}
