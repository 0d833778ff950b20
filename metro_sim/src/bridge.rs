//! The data bridge between the map and external PLC/RTU controllers.
//!
//! Every request is answered from (or applied to) the shared map under one
//! lock. The bridge itself only remembers when each class of data was last
//! fetched, which is how the operator can tell whether a PLC is still polling.

use crate::protocol::{self, ProtocolError, Request, Resource, Verb, DENY};
use crate::world::{lock_map, SharedMap};
use metro_core::{MetroMap, TrackId};
use metro_env::TwinContext;
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

/// Wire key for the collision-avoidance switch in `POST;trainsPlc`.
pub const CONFIG_KEY: &str = "config";

/// Data classes whose fetches are time-stamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchClass {
    Sensors,
    Blocks,
    Stations,
    TrainsPlc,
    TrainsRtu,
}

impl FetchClass {
    pub const ALL: [FetchClass; 5] = [
        FetchClass::Sensors,
        FetchClass::Blocks,
        FetchClass::Stations,
        FetchClass::TrainsPlc,
        FetchClass::TrainsRtu,
    ];

    /// Classes polled by PLCs.
    pub const PLC: [FetchClass; 4] = [
        FetchClass::Sensors,
        FetchClass::Stations,
        FetchClass::TrainsPlc,
        FetchClass::Blocks,
    ];

    /// Classes polled by RTUs.
    pub const RTU: [FetchClass; 1] = [FetchClass::TrainsRtu];

    fn index(self) -> usize {
        self as usize
    }

    pub fn name(&self) -> &'static str {
        match self {
            FetchClass::Sensors => "sensors",
            FetchClass::Blocks => "blocks",
            FetchClass::Stations => "stations",
            FetchClass::TrainsPlc => "trains",
            FetchClass::TrainsRtu => "trains",
        }
    }

    fn of(resource: Resource) -> Option<FetchClass> {
        match resource {
            Resource::Sensors => Some(FetchClass::Sensors),
            Resource::BlockSensors => Some(FetchClass::Blocks),
            Resource::Stations => Some(FetchClass::Stations),
            Resource::TrainsPlc => Some(FetchClass::TrainsPlc),
            Resource::TrainsRtu => Some(FetchClass::TrainsRtu),
            _ => None,
        }
    }
}

/// Liveness of one data class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStatus {
    /// Last successful fetch, if any
    pub last_update: Option<SystemTime>,
    /// Fetched within the timeout
    pub online: bool,
}

impl LinkStatus {
    /// `HH:MM:SS` (UTC) of the last fetch, `--:--:--` if never.
    pub fn clock_label(&self) -> String {
        match self.last_update.and_then(|t| t.duration_since(UNIX_EPOCH).ok()) {
            Some(since_epoch) => {
                let secs = since_epoch.as_secs() % 86_400;
                format!("{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
            }
            None => "--:--:--".to_string(),
        }
    }
}

/// Request handler over the shared map.
pub struct DataBridge<Ctx: TwinContext> {
    map: SharedMap,
    context: Arc<Ctx>,
    plc_timeout: Duration,
    stamps: Mutex<[Option<SystemTime>; 5]>,
}

impl<Ctx: TwinContext> DataBridge<Ctx> {
    pub fn new(map: SharedMap, context: Arc<Ctx>, plc_timeout: Duration) -> Self {
        Self {
            map,
            context,
            plc_timeout,
            stamps: Mutex::new([None; 5]),
        }
    }

    /// Handles one datagram. `None` means no reply is sent (empty datagram).
    pub fn handle(&self, payload: &[u8]) -> Option<Vec<u8>> {
        if payload.is_empty() {
            return None;
        }
        debug!("Incoming message: {}", String::from_utf8_lossy(payload));

        let request = match Request::parse(payload) {
            Ok(request) => request,
            Err(e) => {
                warn!("Denied request: {}", e);
                return Some(DENY.to_vec());
            }
        };

        let body = match self.dispatch(&request) {
            Ok(body) => body,
            Err(e) => {
                warn!("{} failed: {}", request.resource.key(), e);
                protocol::outcome(false)
            }
        };
        Some(protocol::reply(request.resource, &body))
    }

    fn dispatch(&self, request: &Request) -> Result<Value, ProtocolError> {
        if request.resource == Resource::Login {
            return Ok(json!({ "state": "ready" }));
        }

        let key = request.resource.key();
        let payload: Value = serde_json::from_str(&request.payload)
            .map_err(|e| ProtocolError::payload(key, e.to_string()))?;

        match request.verb {
            Verb::Get => {
                let object = match payload {
                    Value::Object(object) => object,
                    other => {
                        return Err(ProtocolError::payload(
                            key,
                            format!("expected an object, got {}", other),
                        ))
                    }
                };
                if let Some(class) = FetchClass::of(request.resource) {
                    self.stamp(class);
                }
                let map = lock_map(&self.map);
                Ok(Value::Object(fill(object, |id| {
                    fetch(&map, request.resource, id)
                })))
            }
            Verb::Post => {
                let object = match payload {
                    Value::Object(object) => object,
                    other => {
                        return Err(ProtocolError::payload(
                            key,
                            format!("expected an object, got {}", other),
                        ))
                    }
                };
                // Decode everything before touching the map
                let mut commands = Vec::with_capacity(object.len());
                let mut avoidance = None;
                for (field, value) in &object {
                    if request.resource == Resource::TrainsPlc && field == CONFIG_KEY {
                        avoidance = Some(config_flag(key, value)?);
                    } else if let Ok(id) = field.parse::<TrackId>() {
                        commands.push((id, protocol::truthy_list(key, value)?));
                    }
                }

                let mut map = lock_map(&self.map);
                for (id, states) in &commands {
                    apply(&mut map, request.resource, *id, states);
                }
                if let Some(enabled) = avoidance {
                    info!("--> change the collision avoidance state: {}", enabled);
                    map.set_collision_avoidance(enabled);
                }
                Ok(protocol::outcome(true))
            }
        }
    }

    fn stamp(&self, class: FetchClass) {
        let now = self.context.system_time();
        self.stamps.lock().unwrap_or_else(PoisonError::into_inner)[class.index()] = Some(now);
    }

    /// Last fetch time and liveness of one data class.
    pub fn link_status(&self, class: FetchClass) -> LinkStatus {
        let last_update =
            self.stamps.lock().unwrap_or_else(PoisonError::into_inner)[class.index()];
        let now = self.context.system_time();
        let online = last_update.is_some_and(|last| {
            now.duration_since(last)
                .map(|age| age < self.plc_timeout)
                // Clock stepped backwards: the fetch is as fresh as it gets
                .unwrap_or(true)
        });
        LinkStatus {
            last_update,
            online,
        }
    }

    /// Link state of every PLC-polled class.
    pub fn plc_links(&self) -> Vec<(FetchClass, LinkStatus)> {
        FetchClass::PLC
            .iter()
            .map(|&class| (class, self.link_status(class)))
            .collect()
    }

    /// Link state of every RTU-polled class.
    pub fn rtu_links(&self) -> Vec<(FetchClass, LinkStatus)> {
        FetchClass::RTU
            .iter()
            .map(|&class| (class, self.link_status(class)))
            .collect()
    }
}

/// Replaces known track keys with data, leaving other keys untouched.
fn fill(mut object: Map<String, Value>, data: impl Fn(TrackId) -> Value) -> Map<String, Value> {
    for (field, value) in object.iter_mut() {
        if let Ok(id) = field.parse::<TrackId>() {
            *value = data(id);
        }
    }
    object
}

fn fetch(map: &MetroMap, resource: Resource, id: TrackId) -> Value {
    match resource {
        Resource::Sensors => {
            let states = map.reported_sensor_states(id);
            let range = map.junction_sensor_range(id);
            json!(states.get(range).unwrap_or_default())
        }
        Resource::BlockSensors => {
            let reported = map.reported_sensor_states(id);
            let states: Vec<u8> = map
                .block_sensor_indices(id)
                .iter()
                .map(|&idx| reported.get(idx).copied().unwrap_or_default())
                .collect();
            json!(states)
        }
        Resource::Stations => {
            let states: Vec<u8> = map
                .stations(id)
                .iter()
                .map(|station| station.is_docked() as u8)
                .collect();
            json!(states)
        }
        Resource::TrainsPlc => {
            let states: Vec<u8> = map
                .trains(id)
                .iter()
                .map(|train| train.power_state() as u8)
                .collect();
            json!(states)
        }
        Resource::TrainsRtu => {
            let readings: Vec<[u32; 4]> = map
                .trains(id)
                .iter()
                .map(|train| {
                    let t = train.telemetry();
                    [t.front_sensor as u32, t.speed, t.voltage, t.current]
                })
                .collect();
            json!(readings)
        }
        Resource::Login | Resource::Signals | Resource::BlockSignals => Value::Null,
    }
}

fn apply(map: &mut MetroMap, resource: Resource, id: TrackId, states: &[bool]) {
    match resource {
        Resource::Signals => map.set_signals(id, states),
        Resource::BlockSignals => map.set_block_signals(id, states),
        Resource::Stations => map.set_station_signals(id, states),
        Resource::TrainsPlc => map.set_train_power(id, states),
        _ => {}
    }
}

/// The avoidance switch travels as a one-element list.
fn config_flag(key: &str, value: &Value) -> Result<bool, ProtocolError> {
    match value {
        Value::Array(items) => match items.first() {
            Some(first) => protocol::truthy(key, first),
            None => Err(ProtocolError::payload(key, "empty config list")),
        },
        other => protocol::truthy(key, other),
    }
}
