//! Canonical field → raw key path tables.
//!
//! The portal's keys are what they are (`tempperature`, `bettery`,
//! `thismonthetotle`, ...). Every lookup the normalizer does goes through one of
//! these entries. Paths are tried in order; the first one present and non-null
//! wins.

/// One canonical field and the raw paths it may be found under.
#[derive(Debug)]
pub struct Field {
    pub name: &'static str,
    pub paths: &'static [&'static [&'static str]],
}

macro_rules! field {
    ($ident:ident, $name:literal, $($path:expr),+ $(,)?) => {
        pub const $ident: Field = Field {
            name: $name,
            paths: &[$($path),+],
        };
    };
}

/// Sections of the `GetMonitorDetailByPowerstationId` data object.
pub mod station {
    use super::Field;

    field!(ID, "station_id", &["info", "powerstation_id"]);
    field!(NAME, "station_name", &["info", "stationname"]);
    field!(KPI, "kpi", &["kpi"]);
    field!(INVERTERS, "inverters", &["inverter"]);
    field!(HAS_POWERFLOW, "has_powerflow", &["hasPowerflow"]);
    field!(POWERFLOW, "powerflow", &["powerflow"]);
    field!(METER_SERIAL, "meter_serial", &["homKit", "sn"]);
    field!(
        HAS_ENERGY_STATISTICS,
        "has_energy_statistics",
        &["hasEnergeStatisticsCharts"],
        &["hasEnergyStatisticsCharts"],
    );
    field!(
        ENERGY_STATISTICS_TODAY,
        "energy_statistics_today",
        &["energeStatisticsCharts"],
        &["energyStatisticsCharts"],
    );
    field!(
        ENERGY_STATISTICS_TOTALS,
        "energy_statistics_totals",
        &["energeStatisticsTotals"],
        &["energyStatisticsTotals"],
    );
}

/// `kpi` object of the station.
pub mod kpi {
    use super::Field;

    field!(CURRENCY, "currency", &["currency"]);
    field!(CURRENT_POWER, "current_power", &["pac"]);
    field!(ENERGY_TODAY, "energy_today", &["power"]);
    field!(ENERGY_THIS_MONTH, "energy_this_month", &["month_generation"]);
    field!(ENERGY_TOTAL, "energy_total", &["total_power"]);
    field!(INCOME_TODAY, "income_today", &["day_income"]);
    field!(INCOME_TOTAL, "income_total", &["total_income"]);
}

/// One element of `inverter[]`; the record is `invert_full` when present.
pub mod inverter {
    use super::Field;

    field!(FULL_RECORD, "record", &["invert_full"]);
    field!(SERIAL_NUMBER, "serial_number", &["sn"]);
    field!(NAME, "name", &["name"]);
    field!(MODEL, "model", &["model_type"], &["type"]);
    field!(CAPACITY, "capacity", &["capacity"]);
    field!(OUTPUT_POWER, "output_power", &["pac"], &["out_pac"]);
    field!(ENERGY_TODAY, "energy_today", &["eday"]);
    field!(ENERGY_THIS_MONTH, "energy_this_month", &["thismonthetotle"], &["emonth"]);
    field!(ENERGY_LAST_MONTH, "energy_last_month", &["lastmonthetotle"]);
    field!(ENERGY_TOTAL, "energy_total", &["etotal"]);
    field!(INCOME_TODAY, "income_today", &["iday"]);
    field!(INCOME_TOTAL, "income_total", &["itotal"]);
    field!(HOURS_TOTAL, "hours_total", &["hour_total"]);
    field!(TEMPERATURE, "temperature", &["tempperature"], &["temperature"]);
    field!(BATTERY_SOC, "battery_soc", &["soc"], &["battery_soc"]);
    field!(STATUS, "status", &["status"]);
    field!(DETAILS_LEFT, "details_left", &["dict", "left"]);
    field!(DETAILS_RIGHT, "details_right", &["dict", "right"]);
}

/// Items of the `dict.left` / `dict.right` point lists.
pub mod detail {
    use super::Field;

    field!(KEY, "key", &["key"]);
    field!(VALUE, "value", &["value"]);
    field!(UNIT, "unit", &["unit"]);
}

/// `powerflow` object of the station.
pub mod powerflow {
    use super::Field;

    field!(PHOTOVOLTAIC, "photovoltaic", &["pv"]);
    field!(PHOTOVOLTAIC_STATUS, "photovoltaic_status", &["pvStatus"]);
    field!(BATTERY, "battery", &["bettery"], &["battery"]);
    field!(BATTERY_STATUS, "battery_status", &["betteryStatus"], &["batteryStatus"]);
    field!(LOAD, "load", &["load"]);
    field!(LOAD_STATUS, "load_status", &["loadStatus"]);
    field!(GRID, "grid", &["grid"]);
    field!(GRID_STATUS, "grid_status", &["gridStatus"]);
    field!(GENSET, "genset", &["genset"]);
    field!(SOC, "soc", &["soc"]);
}

/// `energeStatisticsCharts` / `energeStatisticsTotals` objects.
pub mod energy_statistics {
    use super::Field;

    field!(GENERATION, "generation", &["sum"]);
    field!(BUY, "buy", &["buy"]);
    field!(SELL, "sell", &["sell"]);
    field!(SELF_USE_OF_PV, "self_use_of_pv", &["selfUseOfPv"]);
    field!(CONSUMPTION_OF_LOAD, "consumption_of_load", &["consumptionOfLoad"]);
    field!(CHARGE, "charge", &["charge"]);
    field!(DISCHARGE, "discharge", &["disCharge"]);
    field!(SELF_USE_RATE, "self_use_rate", &["selfUseRate"]);
    field!(CONTRIBUTING_RATE, "contributing_rate", &["contributingRate"]);
}
