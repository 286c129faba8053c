use num_traits::ToPrimitive;
use prometheus::core::Collector;
use prometheus::proto::Metric;
use prometheus::{Encoder, Gauge, GaugeVec, TextEncoder};
use rust_decimal::Decimal;
use sems_rs::{Error, InverterReading, NormalizedSnapshot};

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const FLOWS: [&str; 6] = [
    "photovoltaic",
    "battery",
    "load",
    "grid_import",
    "grid_export",
    "genset",
];

lazy_static! {
    static ref STATION_CURRENT_POWER_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("sems_station_current_power", "current station output (in W)"),
        &["station_id"],
    )
    .unwrap();
    static ref STATION_ENERGY_TODAY_GAUGE: GaugeVec = register_gauge_vec!(
        opts!(
            "sems_station_energy_today",
            "energy generated by the station in current day (in kWh)",
        ),
        &["station_id"],
    )
    .unwrap();
    static ref STATION_ENERGY_TOTAL_GAUGE: GaugeVec = register_gauge_vec!(
        opts!(
            "sems_station_energy_total",
            "energy generated by the station since commissioning (in kWh)",
        ),
        &["station_id"],
    )
    .unwrap();
    static ref INVERTER_OUTPUT_POWER_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("sems_inverter_output_power", "inverter output power (in W)"),
        &["station_id", "serial_number"],
    )
    .unwrap();
    static ref INVERTER_ENERGY_TODAY_GAUGE: GaugeVec = register_gauge_vec!(
        opts!(
            "sems_inverter_energy_today",
            "energy generated by inverter in current day (in kWh)",
        ),
        &["station_id", "serial_number"],
    )
    .unwrap();
    static ref INVERTER_ENERGY_TOTAL_GAUGE: GaugeVec = register_gauge_vec!(
        opts!(
            "sems_inverter_energy_total",
            "energy generated by inverter since commissioning (in kWh)",
        ),
        &["station_id", "serial_number"],
    )
    .unwrap();
    static ref INVERTER_TEMPERATURE_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("sems_inverter_temperature", "inverter reported temperature"),
        &["station_id", "serial_number"],
    )
    .unwrap();
    static ref INVERTER_STATUS_GAUGE: GaugeVec = register_gauge_vec!(
        opts!(
            "sems_inverter_status",
            "inverter status code (-1 offline, 0 waiting, 1 normal, 2 fault)",
        ),
        &["station_id", "serial_number"],
    )
    .unwrap();
    static ref POWERFLOW_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("sems_powerflow", "household power flow (in W)"),
        &["station_id", "flow"],
    )
    .unwrap();
    static ref POWERFLOW_SOC_GAUGE: GaugeVec = register_gauge_vec!(
        opts!("sems_powerflow_soc", "battery state of charge (in %)"),
        &["station_id"],
    )
    .unwrap();
    static ref LAST_SUCCESSFUL_FETCH_GAUGE: Gauge = register_gauge!(opts!(
        "sems_last_successful_fetch_timestamp",
        "unix time of the last successful portal poll",
    ))
    .unwrap();
    static ref DATA_AGE_GAUGE: Gauge = register_gauge!(opts!(
        "sems_data_age_seconds",
        "seconds since the last successful portal poll",
    ))
    .unwrap();
    static ref DATA_STALE_GAUGE: Gauge = register_gauge!(opts!(
        "sems_data_stale",
        "1 when the exported readings are older than the stale threshold",
    ))
    .unwrap();
}

fn station_gauges() -> [&'static GaugeVec; 3] {
    [
        &*STATION_CURRENT_POWER_GAUGE,
        &*STATION_ENERGY_TODAY_GAUGE,
        &*STATION_ENERGY_TOTAL_GAUGE,
    ]
}

fn inverter_gauges() -> [&'static GaugeVec; 5] {
    [
        &*INVERTER_OUTPUT_POWER_GAUGE,
        &*INVERTER_ENERGY_TODAY_GAUGE,
        &*INVERTER_ENERGY_TOTAL_GAUGE,
        &*INVERTER_TEMPERATURE_GAUGE,
        &*INVERTER_STATUS_GAUGE,
    ]
}

/// Set the gauge when the reading is present, drop the series otherwise so a
/// night-time gap is not exported as a stale value.
fn set(gauge: &GaugeVec, labels: &[&str], value: Option<Decimal>) {
    match value.and_then(|v| v.to_f64()) {
        Some(value) => gauge.with_label_values(labels).set(value),
        None => {
            let _ = gauge.remove_label_values(labels);
        }
    }
}

fn label_value<'a>(metric: &'a Metric, name: &str) -> Option<&'a str> {
    metric
        .get_label()
        .iter()
        .find(|label| label.get_name() == name)
        .map(|label| label.get_value())
}

/// Drop the series of inverters `station` no longer reports.
fn forget_inverters(station: &str, current: &HashMap<String, InverterReading>) {
    for gauge in inverter_gauges() {
        let gone: Vec<String> = gauge
            .collect()
            .iter()
            .flat_map(|family| family.get_metric())
            .filter(|metric| label_value(metric, "station_id") == Some(station))
            .filter_map(|metric| label_value(metric, "serial_number"))
            .filter(|serial| !current.contains_key(*serial))
            .map(String::from)
            .collect();

        for serial in gone {
            log::debug!("Inverter {} left station {}, dropping its series", serial, station);
            let _ = gauge.remove_label_values(&[station, serial.as_str()]);
        }
    }
}

/// Feed a fresh snapshot to the Prometheus registry.
///
/// Series whose reading, block or inverter is missing from `snapshot` are
/// removed rather than left at their last value.
pub fn record(snapshot: &NormalizedSnapshot) {
    let station = snapshot.station_id.as_str();

    let kpi = snapshot.kpi.clone().unwrap_or_default();
    let [current_power, energy_today, energy_total] = station_gauges();
    set(current_power, &[station], kpi.current_power);
    set(energy_today, &[station], kpi.energy_today);
    set(energy_total, &[station], kpi.energy_total);

    forget_inverters(station, &snapshot.inverters);
    for (serial, inverter) in &snapshot.inverters {
        let labels = [station, serial.as_str()];
        set(&INVERTER_OUTPUT_POWER_GAUGE, &labels, inverter.output_power);
        set(&INVERTER_ENERGY_TODAY_GAUGE, &labels, inverter.energy_today);
        set(&INVERTER_ENERGY_TOTAL_GAUGE, &labels, inverter.energy_total);
        set(&INVERTER_TEMPERATURE_GAUGE, &labels, inverter.temperature);
        set(
            &*INVERTER_STATUS_GAUGE,
            &labels,
            inverter.status.map(|s| Decimal::from(s as i64)),
        );
    }

    if snapshot.powerflow.is_none() {
        log::trace!("Station {} reports no powerflow", station);
    }
    let powerflow = snapshot.powerflow.clone().unwrap_or_default();
    for (flow, value) in FLOWS.into_iter().zip([
        powerflow.photovoltaic,
        powerflow.battery,
        powerflow.load,
        powerflow.grid_import(),
        powerflow.grid_export(),
        powerflow.genset,
    ]) {
        set(&POWERFLOW_GAUGE, &[station, flow], value);
    }
    set(&POWERFLOW_SOC_GAUGE, &[station], powerflow.soc);
}

/// Mark `at` as the time of the last successful poll.
pub fn record_success(at: SystemTime) {
    let unix = at
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |elapsed| elapsed.as_secs_f64());
    LAST_SUCCESSFUL_FETCH_GAUGE.set(unix);
}

/// Export how old the readings are; `None` before the first successful poll.
pub fn record_freshness(age: Option<Duration>, stale: bool) {
    DATA_AGE_GAUGE.set(age.map_or(0.0, |age| age.as_secs_f64()));
    DATA_STALE_GAUGE.set(if stale { 1.0 } else { 0.0 });
}

/// Read metrics from Prometheus exporter registry.
pub fn read() -> Result<String, Error> {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| Error::Internal(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| Error::Internal(e.to_string()))
}
