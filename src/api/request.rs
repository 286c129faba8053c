//! Request bodies. Field names and order are what the portal expects; serde keeps
//! struct declaration order when serializing.

use crate::model::PowerState;
use serde::Serialize;

#[derive(Serialize)]
pub struct Login<'a> {
    pub account: &'a str,
    pub pwd: &'a str,
}

#[derive(Serialize)]
pub struct MonitorDetail<'a> {
    #[serde(rename = "powerStationId")]
    pub power_station_id: &'a str,
}

#[derive(Serialize)]
pub struct RemoteControl<'a> {
    #[serde(rename = "InverterSN")]
    pub inverter_sn: &'a str,
    #[serde(rename = "InverterStatusSettingMark")]
    pub status_setting_mark: &'static str,
    #[serde(rename = "InverterStatus")]
    pub inverter_status: &'static str,
}

impl<'a> RemoteControl<'a> {
    pub fn new(serial: &'a str, state: PowerState) -> Self {
        RemoteControl {
            inverter_sn: serial,
            status_setting_mark: "1",
            inverter_status: state.wire_value(),
        }
    }
}
