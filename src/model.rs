use num_derive::FromPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

type Watt = Decimal;
type KWh = Decimal;
type KW = Decimal;

/// Login credentials of a SEMS portal account.
///
/// `station_id` may be empty, in which case the first station owned by the
/// account is used.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub station_id: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials {
            username: username.into(),
            password: password.into(),
            station_id: String::new(),
        }
    }

    pub fn with_station_id(mut self, station_id: impl Into<String>) -> Self {
        self.station_id = station_id.into();
        self
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<masked>")
            .field("station_id", &self.station_id)
            .finish()
    }
}

/// Inverter status as reported in `invert_full.status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, Serialize)]
pub enum InverterStatus {
    Offline = -1,
    Waiting = 0,
    Normal = 1,
    Fault = 2,
}

impl InverterStatus {
    pub fn from_code(code: i64) -> Option<Self> {
        num::FromPrimitive::from_i64(code)
    }
}

/// Desired operating mode of an inverter for the remote control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PowerState {
    Off,
    On,
}

impl PowerState {
    /// Value of `InverterStatus` in the remote control request.
    pub fn wire_value(&self) -> &'static str {
        match self {
            PowerState::Off => "0",
            PowerState::On => "1",
        }
    }
}

impl FromStr for PowerState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "on" | "1" | "true" => Ok(PowerState::On),
            "off" | "0" | "false" => Ok(PowerState::Off),
            other => Err(format!("unknown power state `{}`", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct InverterReading {
    pub serial_number: String,
    pub name: Option<String>,
    pub model: Option<String>,
    pub capacity: Option<KW>,
    pub output_power: Option<Watt>,
    pub energy_today: Option<KWh>,
    pub energy_this_month: Option<KWh>,
    pub energy_last_month: Option<KWh>,
    pub energy_total: Option<KWh>,
    pub income_today: Option<Decimal>,
    pub income_total: Option<Decimal>,
    pub hours_total: Option<Decimal>,
    pub temperature: Option<Decimal>,
    pub battery_soc: Option<Decimal>,
    pub status: Option<InverterStatus>,
    pub raw_status: Option<String>,
    /// Readings from the `dict.left`/`dict.right` point lists, keyed by point key,
    /// value rendered with its unit.
    pub details: HashMap<String, String>,
}

/// Direction of the grid exchange, derived from `loadStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GridFlow {
    Import(Watt),
    Export(Watt),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Powerflow {
    pub meter_serial: Option<String>,
    pub photovoltaic: Option<Watt>,
    pub photovoltaic_status: Option<i64>,
    pub battery: Option<Watt>,
    pub battery_status: Option<i64>,
    pub load: Option<Watt>,
    pub load_status: Option<i64>,
    pub grid: Option<Watt>,
    pub grid_status: Option<i64>,
    pub genset: Option<Watt>,
    pub soc: Option<Decimal>,
}

impl Powerflow {
    pub fn grid_flow(&self) -> Option<GridFlow> {
        let grid = self.grid?.abs();
        match self.load_status? {
            1 => Some(GridFlow::Import(grid)),
            -1 => Some(GridFlow::Export(grid)),
            _ => None,
        }
    }

    pub fn grid_import(&self) -> Option<Watt> {
        match self.grid_flow()? {
            GridFlow::Import(power) => Some(power),
            GridFlow::Export(_) => Some(Decimal::ZERO),
        }
    }

    pub fn grid_export(&self) -> Option<Watt> {
        match self.grid_flow()? {
            GridFlow::Export(power) => Some(power),
            GridFlow::Import(_) => Some(Decimal::ZERO),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct StationKpi {
    pub current_power: Option<Watt>,
    pub energy_today: Option<KWh>,
    pub energy_this_month: Option<KWh>,
    pub energy_total: Option<KWh>,
    pub income_today: Option<Decimal>,
    pub income_total: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct EnergyFigures {
    pub generation: Option<KWh>,
    pub buy: Option<KWh>,
    pub sell: Option<KWh>,
    pub self_use_of_pv: Option<KWh>,
    pub consumption_of_load: Option<KWh>,
    pub charge: Option<KWh>,
    pub discharge: Option<KWh>,
    pub self_use_rate: Option<Decimal>,
    pub contributing_rate: Option<Decimal>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct EnergyStatistics {
    pub today: Option<EnergyFigures>,
    pub totals: Option<EnergyFigures>,
}

/// Normalized view of one `GetMonitorDetailByPowerstationId` response.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct NormalizedSnapshot {
    pub station_id: String,
    pub station_name: Option<String>,
    pub currency: Option<String>,
    pub kpi: Option<StationKpi>,
    pub inverters: HashMap<String, InverterReading>,
    pub powerflow: Option<Powerflow>,
    pub energy_statistics: Option<EnergyStatistics>,
}
