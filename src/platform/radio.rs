// SensorStream - BLE Radio (ESP-IDF Bluedroid)
//
// GATT server with one service and two characteristics: the configuration
// descriptor (read) and the packet stream (read + notify).  Stack events
// arrive on the Bluetooth task; they only update `RadioState`, which the
// scheduler thread reads through the `Radio` trait.

use std::sync::{Arc, Mutex, MutexGuard};

use enumset::enum_set;
use esp_idf_hal::modem::Modem;
use esp_idf_svc::bt::ble::gap::{AdvConfiguration, BleGapEvent, EspBleGap};
use esp_idf_svc::bt::ble::gatt::server::{ConnectionId, EspGatts, GattsEvent, TransferId};
use esp_idf_svc::bt::ble::gatt::{
    AutoResponse, GattCharacteristic, GattDescriptor, GattId, GattInterface, GattResponse,
    GattServiceId, GattStatus, Handle, Permission, Property,
};
use esp_idf_svc::bt::{BdAddr, Ble, BtDriver, BtStatus, BtUuid};
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_sys::EspError;

use crate::config::*;
use crate::error::{Error, Result};
use crate::transport::Radio;

const APP_ID: u16 = 0;
const CCCD_UUID: u16 = 0x2902;
const SERVICE_HANDLES: u16 = 8;

type BleDriver = BtDriver<'static, Ble>;
type Gap = Arc<EspBleGap<'static, Ble, Arc<BleDriver>>>;
type Gatts = Arc<EspGatts<'static, Ble, Arc<BleDriver>>>;

#[derive(Default)]
struct RadioState {
    gatt_if: Option<GattInterface>,
    service: Option<Handle>,
    config_handle: Option<Handle>,
    data_handle: Option<Handle>,
    peer: Option<(ConnectionId, BdAddr)>,
    config: Vec<u8>,
    last_packet: Vec<u8>,
}

pub struct EspRadio {
    gap: Gap,
    gatts: Gatts,
    state: Arc<Mutex<RadioState>>,
    address: String,
}

fn radio_err(e: EspError) -> Error {
    Error::Transport(format!("ble: {}", e))
}

fn lock(state: &Mutex<RadioState>) -> MutexGuard<'_, RadioState> {
    // Callbacks never panic while holding the lock; recover if one did.
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl EspRadio {
    pub fn new(modem: Modem, nvs: EspDefaultNvsPartition) -> anyhow::Result<Self> {
        let driver = Arc::new(BleDriver::new(modem, Some(nvs))?);
        let gap: Gap = Arc::new(EspBleGap::new(driver.clone())?);
        let gatts: Gatts = Arc::new(EspGatts::new(driver)?);
        let state = Arc::new(Mutex::new(RadioState::default()));

        let gap_cb = gap.clone();
        gap.subscribe(move |event| {
            if let BleGapEvent::AdvertisingConfigured(status) = event {
                if status == BtStatus::Success {
                    if let Err(e) = gap_cb.start_advertising() {
                        log::warn!("start advertising: {}", e);
                    }
                }
            }
        })?;

        let gatts_cb = gatts.clone();
        let gap_for_gatts = gap.clone();
        let state_cb = state.clone();
        gatts.subscribe(move |(gatt_if, event)| {
            if let Err(e) = on_gatts_event(&gap_for_gatts, &gatts_cb, &state_cb, gatt_if, event) {
                log::warn!("GATT event handling failed: {}", e);
            }
        })?;

        gatts.register_app(APP_ID)?;

        let address = read_bt_address();
        Ok(Self { gap, gatts, state, address })
    }
}

fn read_bt_address() -> String {
    let mut mac = [0u8; 6];
    unsafe {
        esp_idf_sys::esp_read_mac(mac.as_mut_ptr(), esp_idf_sys::esp_mac_type_t_ESP_MAC_BT);
    }
    mac.iter().map(|b| format!("{:02X}", b)).collect::<Vec<_>>().join(":")
}

fn characteristic(uuid: u128, properties: enumset::EnumSet<Property>) -> GattCharacteristic {
    GattCharacteristic {
        uuid: BtUuid::uuid128(uuid),
        permissions: enum_set!(Permission::Read),
        properties,
        max_len: WRITE_BUFFER_SIZE,
        auto_rsp: AutoResponse::ByApp,
    }
}

fn on_gatts_event(
    gap: &Gap,
    gatts: &Gatts,
    state: &Mutex<RadioState>,
    gatt_if: GattInterface,
    event: GattsEvent,
) -> std::result::Result<(), EspError> {
    match event {
        GattsEvent::ServiceRegistered { status, app_id } if status == GattStatus::Ok && app_id == APP_ID => {
            lock(state).gatt_if = Some(gatt_if);
            gap.set_device_name(BLE_PERIPHERAL_NAME)?;
            gap.set_adv_conf(&AdvConfiguration {
                include_name: true,
                include_txpower: true,
                flag: 2,
                service_uuid: Some(BtUuid::uuid128(BLE_SERVICE_UUID)),
                ..Default::default()
            })?;
            gatts.create_service(
                gatt_if,
                &GattServiceId {
                    id: GattId { uuid: BtUuid::uuid128(BLE_SERVICE_UUID), inst_id: 0 },
                    is_primary: true,
                },
                SERVICE_HANDLES,
            )?;
        }
        GattsEvent::ServiceCreated { status, service_handle, .. } if status == GattStatus::Ok => {
            lock(state).service = Some(service_handle);
            gatts.start_service(service_handle)?;
            gatts.add_characteristic(
                service_handle,
                &characteristic(BLE_CONFIG_CHAR_UUID, enum_set!(Property::Read)),
                &[],
            )?;
            gatts.add_characteristic(
                service_handle,
                &characteristic(BLE_DATA_CHAR_UUID, enum_set!(Property::Read | Property::Notify)),
                &[],
            )?;
        }
        GattsEvent::CharacteristicAdded { status, attr_handle, service_handle, char_uuid }
            if status == GattStatus::Ok =>
        {
            let mut st = lock(state);
            if char_uuid == BtUuid::uuid128(BLE_CONFIG_CHAR_UUID) {
                st.config_handle = Some(attr_handle);
            } else if char_uuid == BtUuid::uuid128(BLE_DATA_CHAR_UUID) {
                st.data_handle = Some(attr_handle);
                drop(st);
                gatts.add_descriptor(
                    service_handle,
                    &GattDescriptor {
                        uuid: BtUuid::uuid16(CCCD_UUID),
                        permissions: enum_set!(Permission::Read | Permission::Write),
                    },
                )?;
            }
        }
        GattsEvent::PeerConnected { conn_id, addr, .. } => {
            lock(state).peer = Some((conn_id, addr));
        }
        GattsEvent::PeerDisconnected { addr, .. } => {
            let mut st = lock(state);
            if st.peer.map(|(_, a)| a) == Some(addr) {
                st.peer = None;
            }
        }
        GattsEvent::Read { conn_id, trans_id, handle, offset, need_rsp, .. } if need_rsp => {
            respond_to_read(gatts, state, gatt_if, conn_id, trans_id, handle, offset)?;
        }
        GattsEvent::Write { conn_id, trans_id, handle, need_rsp, .. } if need_rsp => {
            // CCCD writes; notifications are sent regardless of subscription.
            gatts.send_response(gatt_if, conn_id, trans_id, GattStatus::Ok, None)?;
            log::debug!("write to handle {}", handle);
        }
        _ => {}
    }
    Ok(())
}

fn respond_to_read(
    gatts: &Gatts,
    state: &Mutex<RadioState>,
    gatt_if: GattInterface,
    conn_id: ConnectionId,
    trans_id: TransferId,
    handle: Handle,
    offset: u16,
) -> std::result::Result<(), EspError> {
    let value = {
        let st = lock(state);
        if Some(handle) == st.config_handle {
            st.config.clone()
        } else if Some(handle) == st.data_handle {
            st.last_packet.clone()
        } else {
            Vec::new()
        }
    };
    let start = usize::from(offset).min(value.len());
    let mut response = GattResponse::new();
    response.attr_handle(handle).auth_req(0).offset(offset).value(&value[start..])?;
    gatts.send_response(gatt_if, conn_id, trans_id, GattStatus::Ok, Some(&response))
}

impl Radio for EspRadio {
    fn is_connected(&mut self) -> bool {
        lock(&self.state).peer.is_some()
    }

    fn set_config(&mut self, descriptor: &[u8]) -> Result<()> {
        lock(&self.state).config = descriptor.to_vec();
        Ok(())
    }

    fn notify(&mut self, bytes: &[u8]) -> Result<()> {
        let (gatt_if, peer, handle) = {
            let mut st = lock(&self.state);
            st.last_packet.clear();
            st.last_packet.extend_from_slice(bytes);
            (st.gatt_if, st.peer, st.data_handle)
        };
        match (gatt_if, peer, handle) {
            (Some(gatt_if), Some((conn_id, _)), Some(handle)) => {
                self.gatts.notify(gatt_if, conn_id, handle, bytes).map_err(radio_err)
            }
            _ => Err(Error::Transport("no central subscribed".into())),
        }
    }

    fn advertise(&mut self) -> Result<()> {
        self.gap.start_advertising().map_err(radio_err)
    }

    fn address(&self) -> String {
        self.address.clone()
    }
}
