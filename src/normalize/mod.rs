//! Turns the raw `GetMonitorDetailByPowerstationId` payload into a
//! [`NormalizedSnapshot`].
//!
//! Normalization is total for any JSON object: missing sections, empty strings
//! and unexpected shapes become absent values. Only a payload that is not JSON,
//! or whose root is not an object, is a [`Error::Parse`].

pub mod fields;
pub mod value;

use crate::api::response::Envelope;
use crate::api::Error;
use crate::model::{
    EnergyFigures, EnergyStatistics, InverterReading, InverterStatus, NormalizedSnapshot,
    Powerflow, StationKpi,
};
use fields::{detail, energy_statistics, inverter, kpi, powerflow, station};
use serde_json::Value;

use std::collections::HashMap;

/// Normalize the `data` object of a monitor detail response fetched for `station_id`.
pub fn snapshot(station_id: &str, data: &Value) -> Result<NormalizedSnapshot, Error> {
    if !data.is_object() {
        return Err(Error::Parse(format!(
            "station data is not an object: {}",
            kind(data)
        )));
    }

    let kpi_block = value::lookup(data, &station::KPI).filter(|v| v.is_object());

    Ok(NormalizedSnapshot {
        station_id: station_id.to_string(),
        station_name: value::text(data, &station::NAME),
        currency: kpi_block.and_then(|k| value::text(k, &kpi::CURRENCY)),
        kpi: kpi_block.map(station_kpi),
        inverters: inverters(data),
        powerflow: station_powerflow(data),
        energy_statistics: station_energy_statistics(data),
    })
}

/// Normalize a response body, either the full envelope or the bare `data` object.
///
/// The station id is taken from `info.powerstation_id`.
pub fn from_str(text: &str) -> Result<NormalizedSnapshot, Error> {
    let root: Value = serde_json::from_str(text)?;
    let data = if is_envelope(&root) {
        Envelope::parse(text)?.data
    } else {
        root
    };
    let station_id = value::text(&data, &station::ID).unwrap_or_default();
    snapshot(&station_id, &data)
}

fn is_envelope(root: &Value) -> bool {
    root.get("data").is_some() && (root.get("code").is_some() || root.get("hasError").is_some())
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn station_kpi(block: &Value) -> StationKpi {
    StationKpi {
        current_power: value::decimal(block, &kpi::CURRENT_POWER),
        energy_today: value::decimal(block, &kpi::ENERGY_TODAY),
        energy_this_month: value::decimal(block, &kpi::ENERGY_THIS_MONTH),
        energy_total: value::decimal(block, &kpi::ENERGY_TOTAL),
        income_today: value::decimal(block, &kpi::INCOME_TODAY),
        income_total: value::decimal(block, &kpi::INCOME_TOTAL),
    }
}

fn inverters(data: &Value) -> HashMap<String, InverterReading> {
    let mut readings = HashMap::new();
    let entries = match value::lookup(data, &station::INVERTERS) {
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            log::warn!("Ignoring inverter list of type {}", kind(other));
            return readings;
        }
        None => return readings,
    };

    for entry in entries {
        let reading = match inverter_reading(entry) {
            Some(reading) => reading,
            None => {
                log::debug!("Skipping inverter record without serial number");
                continue;
            }
        };
        if readings.contains_key(&reading.serial_number) {
            log::warn!(
                "Duplicate inverter record for {}, keeping the first one",
                reading.serial_number
            );
            continue;
        }
        readings.insert(reading.serial_number.clone(), reading);
    }

    readings
}

fn inverter_reading(entry: &Value) -> Option<InverterReading> {
    let record = value::lookup(entry, &inverter::FULL_RECORD)
        .filter(|r| r.is_object())
        .unwrap_or(entry);
    let serial_number = value::text(record, &inverter::SERIAL_NUMBER)?;

    /* The point lists sit next to `invert_full`, not inside it */
    let mut details = detail_readings(entry);
    if details.is_empty() && !std::ptr::eq(record, entry) {
        details = detail_readings(record);
    }

    let raw_status = value::text(record, &inverter::STATUS);
    let status = value::integer(record, &inverter::STATUS).and_then(InverterStatus::from_code);

    Some(InverterReading {
        name: value::text(record, &inverter::NAME),
        model: value::text(record, &inverter::MODEL),
        capacity: value::decimal(record, &inverter::CAPACITY),
        output_power: value::decimal(record, &inverter::OUTPUT_POWER),
        energy_today: value::decimal(record, &inverter::ENERGY_TODAY),
        energy_this_month: value::decimal(record, &inverter::ENERGY_THIS_MONTH),
        energy_last_month: value::decimal(record, &inverter::ENERGY_LAST_MONTH),
        energy_total: value::decimal(record, &inverter::ENERGY_TOTAL),
        income_today: value::decimal(record, &inverter::INCOME_TODAY),
        income_total: value::decimal(record, &inverter::INCOME_TOTAL),
        hours_total: value::decimal(record, &inverter::HOURS_TOTAL),
        temperature: value::decimal(record, &inverter::TEMPERATURE),
        battery_soc: value::decimal(record, &inverter::BATTERY_SOC),
        status,
        raw_status,
        details,
        serial_number,
    })
}

/// `key → "value unit"` for every point with a non-empty value.
fn detail_readings(record: &Value) -> HashMap<String, String> {
    [&inverter::DETAILS_LEFT, &inverter::DETAILS_RIGHT]
        .iter()
        .filter_map(|field| value::lookup(record, field))
        .filter_map(Value::as_array)
        .flatten()
        .filter_map(|point| {
            let key = value::text(point, &detail::KEY)?;
            let reading = value::text(point, &detail::VALUE)?;
            let unit = value::text(point, &detail::UNIT).unwrap_or_default();
            Some((key, format!("{} {}", reading, unit).trim().to_string()))
        })
        .collect()
}

fn station_powerflow(data: &Value) -> Option<Powerflow> {
    if !value::flag(data, &station::HAS_POWERFLOW) {
        return None;
    }
    let block = value::lookup(data, &station::POWERFLOW).filter(|v| v.is_object())?;

    Some(Powerflow {
        meter_serial: value::text(data, &station::METER_SERIAL),
        photovoltaic: value::decimal(block, &powerflow::PHOTOVOLTAIC),
        photovoltaic_status: value::integer(block, &powerflow::PHOTOVOLTAIC_STATUS),
        battery: value::decimal(block, &powerflow::BATTERY),
        battery_status: value::integer(block, &powerflow::BATTERY_STATUS),
        load: value::decimal(block, &powerflow::LOAD),
        load_status: value::integer(block, &powerflow::LOAD_STATUS),
        grid: value::decimal(block, &powerflow::GRID),
        grid_status: value::integer(block, &powerflow::GRID_STATUS),
        genset: value::decimal(block, &powerflow::GENSET),
        soc: value::decimal(block, &powerflow::SOC),
    })
}

fn station_energy_statistics(data: &Value) -> Option<EnergyStatistics> {
    if !value::flag(data, &station::HAS_ENERGY_STATISTICS) {
        return None;
    }
    let figures = |field: &fields::Field| {
        value::lookup(data, field)
            .filter(|v| v.is_object())
            .map(energy_figures)
    };
    let statistics = EnergyStatistics {
        today: figures(&station::ENERGY_STATISTICS_TODAY),
        totals: figures(&station::ENERGY_STATISTICS_TOTALS),
    };

    if statistics.today.is_none() && statistics.totals.is_none() {
        None
    } else {
        Some(statistics)
    }
}

fn energy_figures(block: &Value) -> EnergyFigures {
    EnergyFigures {
        generation: value::decimal(block, &energy_statistics::GENERATION),
        buy: value::decimal(block, &energy_statistics::BUY),
        sell: value::decimal(block, &energy_statistics::SELL),
        self_use_of_pv: value::decimal(block, &energy_statistics::SELF_USE_OF_PV),
        consumption_of_load: value::decimal(block, &energy_statistics::CONSUMPTION_OF_LOAD),
        charge: value::decimal(block, &energy_statistics::CHARGE),
        discharge: value::decimal(block, &energy_statistics::DISCHARGE),
        self_use_rate: value::decimal(block, &energy_statistics::SELF_USE_RATE),
        contributing_rate: value::decimal(block, &energy_statistics::CONTRIBUTING_RATE),
    }
}
