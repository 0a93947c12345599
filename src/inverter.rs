//! # Inverter Control Helpers
//!
//! Convenience operations for common inverter controls, built on the point
//! accessors and model read/write of a scanned [`Device`]. Every helper
//! refreshes the model it uses before touching it, and writes staged
//! settings before the enable flag that activates them.
//!
//! Models are looked up by name and index 1: `inverter` for status,
//! `controls` for power factor, power limit and connection, `settings` for
//! the ramp rate, and the curve models `volt_var`, `volt_watt` and
//! `freq_watt`.

use crate::device::{Device, ModelHandle};
use crate::error::SunSpecError;
use crate::model::instance::Model;
use crate::transport::RegisterTransport;

const INVERTER_MODEL: &str = "inverter";
const CONTROLS_MODEL: &str = "controls";
const SETTINGS_MODEL: &str = "settings";

/// Curve-based control modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurveKind {
    VoltVar,
    VoltWatt,
    FreqWatt,
}

impl CurveKind {
    pub fn model_name(self) -> &'static str {
        match self {
            CurveKind::VoltVar => "volt_var",
            CurveKind::VoltWatt => "volt_watt",
            CurveKind::FreqWatt => "freq_watt",
        }
    }

    fn x_prefix(self) -> &'static str {
        match self {
            CurveKind::VoltVar | CurveKind::VoltWatt => "V",
            CurveKind::FreqWatt => "Hz",
        }
    }

    fn y_prefix(self) -> &'static str {
        match self {
            CurveKind::VoltVar => "VAr",
            CurveKind::VoltWatt | CurveKind::FreqWatt => "W",
        }
    }
}

/// Optional timing for a control change, in seconds. `None` leaves the
/// device's current setting alone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timers {
    pub win_tms: Option<u16>,
    pub rvrt_tms: Option<u16>,
    pub rmp_tms: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModStatus {
    pub mod_ena: u16,
    pub act_crv: u16,
    pub n_crv: u16,
    pub n_pt: u16,
    pub timers: Timers,
}

/// One curve of a curve model.
///
/// Optional fields are `None` when the device does not implement the point;
/// on write, `None` leaves the point alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Curve {
    /// Voltage or frequency points.
    pub x: Vec<f32>,
    /// VAr or W points, paired with `x`.
    pub y: Vec<f32>,
    /// Dependent reference; 0 for models without one.
    pub dept_ref: u16,
    pub name: String,
    pub rmp_tms: Option<u16>,
    pub rmp_dec_tmm: Option<f32>,
    pub rmp_inc_tmm: Option<f32>,
    /// Freq-watt only from here on.
    pub rmp_pt1_tms: Option<u16>,
    pub rmp_rs_up: Option<f32>,
    pub w_ref: Option<f32>,
    pub w_ref_str_hz: Option<f32>,
    pub w_ref_stop_hz: Option<f32>,
    pub read_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixedPf {
    pub enabled: bool,
    pub pf: f32,
    pub timers: Timers,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaxPower {
    pub enabled: bool,
    /// Percent of WMax.
    pub power: f32,
    pub timers: Timers,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Connection {
    pub connected: bool,
    pub timers: Timers,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InverterStatus {
    pub power: f32,
    pub pf: f32,
    pub total_energy: f32,
    pub events: u32,
}

async fn refresh<T: RegisterTransport>(
    device: &mut Device<T>,
    name: &str,
) -> Result<ModelHandle, SunSpecError> {
    let handle = device.model_by_name(name, 1)?;
    device.read_model(handle).await?;
    Ok(handle)
}

fn implemented(model: &Model, id: &str, block: usize) -> bool {
    model.is_implemented(id, block).unwrap_or(false)
}

fn optional_u16(model: &Model, id: &str, block: usize) -> Result<Option<u16>, SunSpecError> {
    if !implemented(model, id, block) {
        return Ok(None);
    }
    Ok(Some(model.get_uint16(id, block)?.0))
}

fn optional_f32(model: &Model, id: &str, block: usize) -> Result<Option<f32>, SunSpecError> {
    if !implemented(model, id, block) {
        return Ok(None);
    }
    Ok(Some(model.get_float32(id, block)?))
}

fn timer_names(prefix: &str) -> [String; 3] {
    [
        format!("{prefix}WinTms"),
        format!("{prefix}RvrtTms"),
        format!("{prefix}RmpTms"),
    ]
}

fn read_timers(model: &Model, prefix: &str) -> Result<Timers, SunSpecError> {
    let [win, rvrt, rmp] = timer_names(prefix);
    Ok(Timers {
        win_tms: optional_u16(model, &win, 0)?,
        rvrt_tms: optional_u16(model, &rvrt, 0)?,
        rmp_tms: optional_u16(model, &rmp, 0)?,
    })
}

fn requested_timers(prefix: &str, timers: &Timers) -> impl Iterator<Item = (String, u16)> {
    let [win, rvrt, rmp] = timer_names(prefix);
    [(win, timers.win_tms), (rvrt, timers.rvrt_tms), (rmp, timers.rmp_tms)]
        .into_iter()
        .filter_map(|(id, value)| Some((id, value?)))
}

/// Fail `Unimplemented` if a requested timer is missing on the device.
fn check_timers(model: &Model, prefix: &str, timers: &Timers) -> Result<(), SunSpecError> {
    if requested_timers(prefix, timers).all(|(id, _)| implemented(model, &id, 0)) {
        Ok(())
    } else {
        Err(SunSpecError::Unimplemented)
    }
}

/// Stage the requested timers, skipping any the device does not implement.
fn stage_timers(model: &mut Model, prefix: &str, timers: &Timers) -> Result<(), SunSpecError> {
    for (id, value) in requested_timers(prefix, timers) {
        if implemented(model, &id, 0) {
            model.set_uint16(&id, 0, value, 0)?;
        }
    }
    Ok(())
}

/// Clear `ModEna` of a curve model.
pub async fn mod_disable<T: RegisterTransport>(device: &mut Device<T>, name: &str) -> Result<(), SunSpecError> {
    let handle = refresh(device, name).await?;
    device.get_mut(handle)?.set_uint16("ModEna", 0, 0, 0)?;
    device.write_model(handle).await
}

/// Select curve `act_crv` and enable the mode; curve 0 selects no curve
/// and leaves the mode disabled.
pub async fn curve_enable<T: RegisterTransport>(
    device: &mut Device<T>,
    name: &str,
    act_crv: u16,
    timers: Option<&Timers>,
) -> Result<(), SunSpecError> {
    let handle = refresh(device, name).await?;
    let model = device.get_mut(handle)?;
    let (n_crv, _) = model.get_uint16("NCrv", 0)?;
    if act_crv > n_crv {
        return Err(SunSpecError::Range);
    }
    if let Some(timers) = timers {
        check_timers(model, "", timers)?;
    }
    model.set_uint16("ActCrv", 0, act_crv, 0)?;
    if let Some(timers) = timers {
        stage_timers(model, "", timers)?;
    }
    device.write_model(handle).await?;

    let mod_ena = u16::from(act_crv != 0);
    device.get_mut(handle)?.set_uint16("ModEna", 0, mod_ena, 0)?;
    device.write_model(handle).await
}

/// Enable state, active curve and capacity of a curve model.
pub async fn mod_status<T: RegisterTransport>(device: &mut Device<T>, name: &str) -> Result<ModStatus, SunSpecError> {
    let handle = refresh(device, name).await?;
    let model = device.get(handle)?;
    Ok(ModStatus {
        mod_ena: model.get_uint16("ModEna", 0)?.0,
        act_crv: model.get_uint16("ActCrv", 0)?.0,
        n_crv: model.get_uint16("NCrv", 0)?.0,
        n_pt: model.get_uint16("NPt", 0)?.0,
        timers: read_timers(model, "")?,
    })
}

/// Write the window, revert and ramp timers of a curve model.
pub async fn set_mod_timers<T: RegisterTransport>(
    device: &mut Device<T>,
    name: &str,
    timers: &Timers,
) -> Result<(), SunSpecError> {
    let handle = refresh(device, name).await?;
    let model = device.get_mut(handle)?;
    check_timers(model, "", timers)?;
    stage_timers(model, "", timers)?;
    device.write_model(handle).await
}

pub async fn volt_var_enable<T: RegisterTransport>(
    device: &mut Device<T>,
    act_crv: u16,
    timers: Option<&Timers>,
) -> Result<(), SunSpecError> {
    curve_enable(device, CurveKind::VoltVar.model_name(), act_crv, timers).await
}

pub async fn volt_var_disable<T: RegisterTransport>(device: &mut Device<T>) -> Result<(), SunSpecError> {
    mod_disable(device, CurveKind::VoltVar.model_name()).await
}

pub async fn volt_watt_enable<T: RegisterTransport>(
    device: &mut Device<T>,
    act_crv: u16,
    timers: Option<&Timers>,
) -> Result<(), SunSpecError> {
    curve_enable(device, CurveKind::VoltWatt.model_name(), act_crv, timers).await
}

pub async fn volt_watt_disable<T: RegisterTransport>(device: &mut Device<T>) -> Result<(), SunSpecError> {
    mod_disable(device, CurveKind::VoltWatt.model_name()).await
}

pub async fn freq_watt_enable<T: RegisterTransport>(
    device: &mut Device<T>,
    act_crv: u16,
    timers: Option<&Timers>,
) -> Result<(), SunSpecError> {
    curve_enable(device, CurveKind::FreqWatt.model_name(), act_crv, timers).await
}

pub async fn freq_watt_disable<T: RegisterTransport>(device: &mut Device<T>) -> Result<(), SunSpecError> {
    mod_disable(device, CurveKind::FreqWatt.model_name()).await
}

fn check_curve_index(model: &Model, index: u16) -> Result<(usize, u16), SunSpecError> {
    let (n_crv, _) = model.get_uint16("NCrv", 0)?;
    let block = usize::from(index);
    if index == 0 || index > n_crv || block > model.repeating_count() {
        return Err(SunSpecError::Range);
    }
    let (n_pt, _) = model.get_uint16("NPt", 0)?;
    Ok((block, n_pt))
}

/// Read curve `index` (1-based).
pub async fn curve_get<T: RegisterTransport>(
    device: &mut Device<T>,
    kind: CurveKind,
    index: u16,
) -> Result<Curve, SunSpecError> {
    let handle = refresh(device, kind.model_name()).await?;
    let model = device.get(handle)?;
    let (block, n_pt) = check_curve_index(model, index)?;

    let active = match optional_u16(model, "ActPt", block)? {
        Some(act_pt) => act_pt.min(n_pt),
        None => n_pt,
    };
    let mut curve = Curve::default();
    for i in 1..=active {
        curve.x.push(model.get_float32(&format!("{}{i}", kind.x_prefix()), block)?);
        curve.y.push(model.get_float32(&format!("{}{i}", kind.y_prefix()), block)?);
    }
    curve.dept_ref = optional_u16(model, "DeptRef", block)?.unwrap_or(0);
    curve.name = model.get_string("CrvNam", block)?.into_owned();
    curve.rmp_tms = optional_u16(model, "RmpTms", block)?;
    curve.rmp_dec_tmm = optional_f32(model, "RmpDecTmm", block)?;
    curve.rmp_inc_tmm = optional_f32(model, "RmpIncTmm", block)?;
    curve.rmp_pt1_tms = optional_u16(model, "RmpPT1Tms", block)?;
    curve.rmp_rs_up = optional_f32(model, "RmpRsUp", block)?;
    curve.w_ref = optional_f32(model, "WRef", block)?;
    curve.w_ref_str_hz = optional_f32(model, "WRefStrHz", block)?;
    curve.w_ref_stop_hz = optional_f32(model, "WRefStopHz", block)?;
    curve.read_only = model.get_uint16("ReadOnly", block)?.0 != 0;
    Ok(curve)
}

/// Write curve `index` (1-based). Read-only curves are refused with `Range`.
pub async fn curve_set<T: RegisterTransport>(
    device: &mut Device<T>,
    kind: CurveKind,
    index: u16,
    curve: &Curve,
) -> Result<(), SunSpecError> {
    let handle = refresh(device, kind.model_name()).await?;
    let model = device.get_mut(handle)?;
    let (block, n_pt) = check_curve_index(model, index)?;

    if optional_u16(model, "ReadOnly", block)?.unwrap_or(0) != 0 {
        return Err(SunSpecError::Range);
    }
    if curve.x.len() != curve.y.len() || curve.x.len() > usize::from(n_pt) {
        return Err(SunSpecError::Range);
    }

    for (i, (x, y)) in curve.x.iter().zip(&curve.y).enumerate() {
        let n = i + 1;
        model.set_float32(&format!("{}{n}", kind.x_prefix()), block, *x)?;
        model.set_float32(&format!("{}{n}", kind.y_prefix()), block, *y)?;
    }
    if model.point("ActPt", block).is_some() {
        model.set_uint16("ActPt", block, curve.x.len() as u16, 0)?;
    }
    if model.point("DeptRef", block).is_some() {
        model.set_uint16("DeptRef", block, curve.dept_ref, 0)?;
    }
    if !curve.name.is_empty() {
        model.set_string("CrvNam", block, &curve.name)?;
    }
    for (id, value) in [("RmpTms", curve.rmp_tms), ("RmpPT1Tms", curve.rmp_pt1_tms)] {
        if let Some(value) = value {
            model.set_uint16(id, block, value, 0)?;
        }
    }
    let scaled = [
        ("RmpDecTmm", curve.rmp_dec_tmm),
        ("RmpIncTmm", curve.rmp_inc_tmm),
        ("RmpRsUp", curve.rmp_rs_up),
        ("WRef", curve.w_ref),
        ("WRefStrHz", curve.w_ref_str_hz),
        ("WRefStopHz", curve.w_ref_stop_hz),
    ];
    for (id, value) in scaled {
        if let Some(value) = value {
            model.set_float32(id, block, value)?;
        }
    }
    device.write_model(handle).await
}

fn require(model: &Model, ids: &[&str]) -> Result<(), SunSpecError> {
    if ids.iter().all(|id| implemented(model, id, 0)) {
        Ok(())
    } else {
        Err(SunSpecError::Unimplemented)
    }
}

/// Stage `settings`, write them, then write `enable_id = enabled`.
async fn set_then_enable<T, F>(
    device: &mut Device<T>,
    required: &[&str],
    enable_id: &str,
    enabled: bool,
    settings: F,
) -> Result<(), SunSpecError>
where
    T: RegisterTransport,
    F: FnOnce(&mut Model) -> Result<(), SunSpecError>,
{
    let handle = refresh(device, CONTROLS_MODEL).await?;
    let model = device.get_mut(handle)?;
    require(model, required)?;
    settings(model)?;
    device.write_model(handle).await?;

    device
        .get_mut(handle)?
        .set_uint16(enable_id, 0, u16::from(enabled), 0)?;
    device.write_model(handle).await
}

pub async fn fixed_pf_get<T: RegisterTransport>(device: &mut Device<T>) -> Result<FixedPf, SunSpecError> {
    let handle = refresh(device, CONTROLS_MODEL).await?;
    let model = device.get(handle)?;
    require(model, &["OutPFSet", "OutPFSet_Ena"])?;
    Ok(FixedPf {
        enabled: model.get_uint16("OutPFSet_Ena", 0)?.0 != 0,
        pf: model.get_float32("OutPFSet", 0)?,
        timers: read_timers(model, "OutPFSet_")?,
    })
}

/// Write the power factor setpoint and timers, then its enable flag.
pub async fn fixed_pf_set<T: RegisterTransport>(device: &mut Device<T>, fixed_pf: &FixedPf) -> Result<(), SunSpecError> {
    set_then_enable(
        device,
        &["OutPFSet", "OutPFSet_Ena"],
        "OutPFSet_Ena",
        fixed_pf.enabled,
        |model| {
            model.set_float32("OutPFSet", 0, fixed_pf.pf)?;
            stage_timers(model, "OutPFSet_", &fixed_pf.timers)
        },
    )
    .await
}

pub async fn fixed_pf_enable<T: RegisterTransport>(device: &mut Device<T>, pf: f32) -> Result<(), SunSpecError> {
    fixed_pf_set(
        device,
        &FixedPf {
            enabled: true,
            pf,
            timers: Timers::default(),
        },
    )
    .await
}

pub async fn fixed_pf_disable<T: RegisterTransport>(device: &mut Device<T>) -> Result<(), SunSpecError> {
    set_then_enable(device, &["OutPFSet_Ena"], "OutPFSet_Ena", false, |_| Ok(())).await
}

pub async fn max_power_get<T: RegisterTransport>(device: &mut Device<T>) -> Result<MaxPower, SunSpecError> {
    let handle = refresh(device, CONTROLS_MODEL).await?;
    let model = device.get(handle)?;
    require(model, &["WMaxLimPct", "WMaxLim_Ena"])?;
    Ok(MaxPower {
        enabled: model.get_uint16("WMaxLim_Ena", 0)?.0 != 0,
        power: model.get_float32("WMaxLimPct", 0)?,
        timers: read_timers(model, "WMaxLimPct_")?,
    })
}

/// Write the power limit and timers, then its enable flag.
pub async fn max_power_set<T: RegisterTransport>(device: &mut Device<T>, max_power: &MaxPower) -> Result<(), SunSpecError> {
    set_then_enable(
        device,
        &["WMaxLimPct", "WMaxLim_Ena"],
        "WMaxLim_Ena",
        max_power.enabled,
        |model| {
            model.set_float32("WMaxLimPct", 0, max_power.power)?;
            stage_timers(model, "WMaxLimPct_", &max_power.timers)
        },
    )
    .await
}

pub async fn max_power_enable<T: RegisterTransport>(device: &mut Device<T>, power: f32) -> Result<(), SunSpecError> {
    max_power_set(
        device,
        &MaxPower {
            enabled: true,
            power,
            timers: Timers::default(),
        },
    )
    .await
}

pub async fn max_power_disable<T: RegisterTransport>(device: &mut Device<T>) -> Result<(), SunSpecError> {
    set_then_enable(device, &["WMaxLim_Ena"], "WMaxLim_Ena", false, |_| Ok(())).await
}

pub async fn connection_get<T: RegisterTransport>(device: &mut Device<T>) -> Result<Connection, SunSpecError> {
    let handle = refresh(device, CONTROLS_MODEL).await?;
    let model = device.get(handle)?;
    require(model, &["Conn"])?;
    let timers = read_timers(model, "Conn_")?;
    Ok(Connection {
        connected: model.get_uint16("Conn", 0)?.0 != 0,
        timers: Timers {
            rmp_tms: None,
            ..timers
        },
    })
}

/// Write the connection timers, then `Conn`.
pub async fn connection_set<T: RegisterTransport>(device: &mut Device<T>, connection: &Connection) -> Result<(), SunSpecError> {
    let timers = Timers {
        rmp_tms: None,
        ..connection.timers
    };
    set_then_enable(device, &["Conn"], "Conn", connection.connected, |model| {
        stage_timers(model, "Conn_", &timers)
    })
    .await
}

pub async fn connect<T: RegisterTransport>(device: &mut Device<T>) -> Result<(), SunSpecError> {
    connection_set(
        device,
        &Connection {
            connected: true,
            timers: Timers::default(),
        },
    )
    .await
}

pub async fn disconnect<T: RegisterTransport>(device: &mut Device<T>) -> Result<(), SunSpecError> {
    connection_set(device, &Connection::default()).await
}

/// Maximum ramp rate `WGra`, in percent of WMax per second.
pub async fn wgra_get<T: RegisterTransport>(device: &mut Device<T>) -> Result<f32, SunSpecError> {
    let handle = refresh(device, SETTINGS_MODEL).await?;
    let model = device.get(handle)?;
    require(model, &["WGra"])?;
    model.get_float32("WGra", 0)
}

pub async fn wgra_set<T: RegisterTransport>(device: &mut Device<T>, wgra: f32) -> Result<(), SunSpecError> {
    let handle = refresh(device, SETTINGS_MODEL).await?;
    let model = device.get_mut(handle)?;
    require(model, &["WGra"])?;
    model.set_float32("WGra", 0, wgra)?;
    device.write_model(handle).await
}

/// Output power, power factor, lifetime energy and event bits.
pub async fn status<T: RegisterTransport>(device: &mut Device<T>) -> Result<InverterStatus, SunSpecError> {
    let handle = refresh(device, INVERTER_MODEL).await?;
    let model = device.get(handle)?;
    Ok(InverterStatus {
        power: model.get_float32("W", 0)?,
        pf: model.get_float32("PF", 0)?,
        total_energy: model.get_float32("WH", 0)?,
        events: model.get_uint32("Evt1", 0)?.0,
    })
}
