use embassy_futures::block_on;

use super::*;
use crate::app_state::ErrorCode;
use crate::frames::{
    DownlinkCommand, GEOLOC_FRAME_SIZE, GeolocFrame, StartupFrame, UplinkFrame, WEATHER_FRAME_SIZE,
    WEATHER_WIND_FRAME_SIZE, WeatherFrame,
};
use crate::hal::{Acquisition, AcquisitionStatus, BitRate, GnssPosition, HalError, TemperatureHumidity};
use crate::storage::{ChannelId, LAST_DOWNLINK_ADDRESS};
use crate::testing::MockBoard;

fn station(interrupts: &InterruptContext, config: StationConfig) -> Station<'_, MockBoard> {
    Station::new(MockBoard::new(), interrupts, config)
}

/// Step until `state` is reached, giving up after `max` steps.
fn step_until(station: &mut Station<'_, MockBoard>, state: OperatingState, max: usize) -> bool {
    for _ in 0..max {
        if station.state() == state {
            return true;
        }
        block_on(station.step());
    }
    station.state() == state
}

fn climate(temperature_tenth_degrees: i32, humidity_percent: i32) -> Result<TemperatureHumidity, HalError> {
    Ok(TemperatureHumidity {
        temperature_tenth_degrees,
        humidity_percent,
    })
}

#[test]
fn test_startup_sends_reset_reason() {
    let interrupts = InterruptContext::new();
    let mut station = station(&interrupts, StationConfig::default());
    assert!(station.flags().contains(RequestFlag::RtcCalibration));
    assert_eq!(station.board().alarm_second, Some(0));

    block_on(station.step());
    assert_eq!(station.state(), OperatingState::RtcCalibration);
    let sent = &station.board().sent[0];
    assert_eq!(sent.bit_rate, BitRate::Bps600);
    assert_eq!(StartupFrame::decode(&sent.payload).unwrap().reset_reason, 0x0C);
    assert_eq!(station.board().reset_flags, 0);
    assert!(station.status().get(StatusBit::ExternalClock));
}

#[test]
fn test_alarm_second_follows_device_id() {
    let interrupts = InterruptContext::new();
    let mut board = MockBoard::new();
    board.nvm[3] = 135;
    let station = Station::new(board, &interrupts, StationConfig::default());
    assert_eq!(station.board().alarm_second, Some(15));
}

#[test]
fn test_failed_calibration_still_clears_request() {
    let interrupts = InterruptContext::new();
    let mut station = station(&interrupts, StationConfig::default());
    assert!(step_until(&mut station, OperatingState::TaskEnd, 4));
    assert!(!station.flags().contains(RequestFlag::RtcCalibration));
    assert!(!station.status().get(StatusBit::FirstRtcCalibration));
    assert!(!station.board().enabled_domains.contains(&PowerDomain::Gnss));

    block_on(station.step());
    assert!(station.board().wind_armed);
    assert!(station.board().rainfall_armed);
    assert!(!station.status().get(StatusBit::ExternalClock));
}

#[test]
fn test_measure_then_weather_on_sharp_hour() {
    let interrupts = InterruptContext::new();
    let mut station = station(&interrupts, StationConfig::default());
    station
        .board_mut()
        .ambient_climate
        .push(climate(100, 55))
        .push(climate(120, 60))
        .push(climate(110, 65));

    for _ in 0..3 {
        assert!(step_until(&mut station, OperatingState::Measure, 10));
        block_on(station.step());
    }
    assert_eq!(station.state(), OperatingState::TaskCheck);
    assert_eq!(
        station.measurements().channel(ChannelId::AmbientTemperature).sample_count(),
        3
    );

    let uptime = station.board().uptime;
    interrupts.on_sharp_hour_alarm(uptime);
    block_on(station.step());
    assert_eq!(station.state(), OperatingState::Weather);
    assert!(!station.board().wind_armed);
    assert!(station.flags().contains(RequestFlag::FirstSharpHourAlarm));
    assert_eq!(station.board().clock_calibrations, 1);

    let sent_before = station.board().sent.len();
    block_on(station.step());
    assert_eq!(station.state(), OperatingState::Monitoring);
    let sent = &station.board().sent[sent_before];
    assert_eq!(sent.payload.len(), WEATHER_WIND_FRAME_SIZE);
    assert_eq!(sent.bit_rate, BitRate::Bps100);
    assert!(!sent.bidirectional);
    let frame = WeatherFrame::decode(&sent.payload).unwrap();
    assert_eq!(frame.ambient_temperature_degrees(), Some(10));
    assert_eq!(frame.ambient_humidity_percent, 60);
    assert_eq!(station.board().wind_resets, 1);
    assert_eq!(
        station.measurements().channel(ChannelId::AmbientTemperature).sample_count(),
        0
    );

    block_on(station.step());
    assert_eq!(station.state(), OperatingState::Geoloc);
    assert_eq!(station.board().sent.len(), sent_before + 2);
    assert!(!station.flags().contains(RequestFlag::Monitoring));
}

#[test]
fn test_standard_station_reports_without_wind() {
    let interrupts = InterruptContext::new();
    let config = StationConfig {
        mode: StationMode::Standard,
        bidirectional: false,
        ..Default::default()
    };
    let mut station = station(&interrupts, config);
    assert!(!station.status().get(StatusBit::StationMode));
    assert!(step_until(&mut station, OperatingState::Sleep, 10));
    assert!(!station.board().wind_armed);

    interrupts.on_sharp_hour_alarm(30);
    assert!(step_until(&mut station, OperatingState::Weather, 4));
    block_on(station.step());
    let weather = station.board().sent.last().unwrap();
    assert_eq!(weather.payload.len(), WEATHER_FRAME_SIZE);
    assert_eq!(station.board().wind_resets, 0);
}

#[test]
fn test_wind_process_event() {
    let interrupts = InterruptContext::new();
    let mut station = station(&interrupts, StationConfig::default());
    station.state = OperatingState::TaskCheck;
    interrupts.on_wind_process();
    block_on(station.step());
    assert_eq!(station.board().wind_processed, 1);
}

#[test]
fn test_set_period_downlink_is_persisted() {
    let interrupts = InterruptContext::new();
    let mut station = station(&interrupts, StationConfig::default());
    assert_eq!(station.weather_data_period(), WeatherDataPeriod::Minutes60);

    let command = station.handle_downlink(&[2, 1, 0, 0, 0, 0, 0, 0]).unwrap();
    assert_eq!(command, DownlinkCommand::SetWeatherDataPeriod(WeatherDataPeriod::Minutes30));
    assert_eq!(station.weather_data_period().seconds(), 1800);
    assert_eq!(station.board().nvm[42], 1);

    assert!(station.handle_downlink(&[2, 9, 0, 0, 0, 0, 0, 0]).is_err());
    assert_eq!(station.weather_data_period(), WeatherDataPeriod::Minutes30);
    assert_eq!(station.board().nvm[42], 1);
    assert_eq!(station.errors().iter().last(), Some(&ErrorCode(0x0F11)));

    assert!(station.handle_downlink(&[7, 0, 0, 0, 0, 0, 0, 0]).is_err());
    assert_eq!(station.errors().iter().last(), Some(&ErrorCode(0x0F10)));
}

#[test]
fn test_stored_period_survives_restart() {
    let interrupts = InterruptContext::new();
    let mut board = MockBoard::new();
    board.nvm[42] = 5;
    let station = Station::new(board, &interrupts, StationConfig::default());
    assert_eq!(station.weather_data_period(), WeatherDataPeriod::Minutes10);

    let mut board = MockBoard::new();
    board.nvm[42] = 0xFF;
    let station = Station::new(board, &interrupts, StationConfig::default());
    assert_eq!(station.weather_data_period(), WeatherDataPeriod::Minutes60);
    assert_eq!(station.board().nvm[42], 0);
}

#[test]
fn test_reset_is_deferred_to_sleep() {
    let interrupts = InterruptContext::new();
    let mut station = station(&interrupts, StationConfig::default());
    station.handle_downlink(&[1, 0, 0, 0, 0, 0, 0, 0]).unwrap();
    assert!(station.flags().contains(RequestFlag::Reset));
    assert_eq!(station.board().software_resets, 0);

    station.state = OperatingState::Sleep;
    block_on(station.step());
    assert_eq!(station.board().software_resets, 1);
    assert_eq!(station.board().deep_sleeps, 1);
    assert!(!station.flags().contains(RequestFlag::Reset));
    assert_eq!(station.state(), OperatingState::TaskCheck);
}

#[test]
fn test_bidirectional_weather_completes_downlink() {
    let interrupts = InterruptContext::new();
    let mut station = station(&interrupts, StationConfig::default());
    station.board_mut().now = RtcTime::new(2024, 1, 2, 14, 0, 0);
    station.board_mut().radio.push(Ok(Some([2, 5, 0, 0, 0, 0, 0, 0])));
    station.flags.clear(RequestFlag::RtcCalibration);
    station.flags.set(RequestFlag::Weather);
    station.state = OperatingState::TaskCheck;

    block_on(station.step());
    assert_eq!(station.state(), OperatingState::Weather);
    assert!(station.flags().contains(RequestFlag::Downlink));
    block_on(station.step());

    let sent = station.board().sent.last().unwrap();
    assert!(sent.bidirectional);
    assert!(!station.flags().contains(RequestFlag::Downlink));
    assert!(station.status().get(StatusBit::DailyDownlink));
    assert_eq!(station.weather_data_period(), WeatherDataPeriod::Minutes10);
    let record = station.board_mut().load_timestamp(TimestampKind::LastDownlink).unwrap();
    assert_eq!((record.year, record.month, record.date, record.status), (2024, 1, 2, true));
}

#[test]
fn test_downlink_stays_pending_when_radio_is_off() {
    let interrupts = InterruptContext::new();
    let mut station = station(&interrupts, StationConfig::default());
    station.board_mut().now = RtcTime::new(2024, 1, 2, 14, 0, 0);
    station.gates.update(900);
    assert!(!station.gates().radio_enabled());
    station.flags.clear(RequestFlag::RtcCalibration);
    station.flags.set(RequestFlag::Weather);
    station.state = OperatingState::TaskCheck;

    block_on(station.step());
    assert_eq!(station.state(), OperatingState::Weather);
    assert!(station.flags().contains(RequestFlag::Downlink));
    let daily_downlink = station.status().get(StatusBit::DailyDownlink);
    let downlink_address = usize::from(LAST_DOWNLINK_ADDRESS);
    let record_before = station.board().nvm[downlink_address..downlink_address + 5].to_vec();

    block_on(station.step());
    assert_eq!(station.state(), OperatingState::Monitoring);
    assert!(station.board().sent.is_empty());
    assert!(station.flags().contains(RequestFlag::Downlink));
    assert_eq!(station.status().get(StatusBit::DailyDownlink), daily_downlink);
    assert_eq!(
        &station.board().nvm[downlink_address..downlink_address + 5],
        record_before.as_slice()
    );
}

#[test]
fn test_day_change_requests_calibration() {
    let interrupts = InterruptContext::new();
    let mut station = station(&interrupts, StationConfig::default());
    station.flags.clear(RequestFlag::RtcCalibration);
    let mut yesterday = TimestampRecord::from_time(&RtcTime::new(2024, 1, 1, 10, 0, 0), false);
    station
        .board_mut()
        .store_timestamp(TimestampKind::LastWakeUp, &yesterday)
        .unwrap();

    station.update_additional_requests();
    assert!(station.flags().contains(RequestFlag::RtcCalibration));
    assert!(station.flags().contains(RequestFlag::ValidWakeup));
    assert!(!station.flags().contains(RequestFlag::Geoloc));

    station.flags.clear(RequestFlag::RtcCalibration);
    yesterday.date = 2;
    yesterday.minutes = 59;
    yesterday.hours = 9;
    station
        .board_mut()
        .store_timestamp(TimestampKind::LastWakeUp, &yesterday)
        .unwrap();
    station.update_additional_requests();
    assert!(!station.flags().contains(RequestFlag::RtcCalibration));
    assert!(station.flags().contains(RequestFlag::ValidWakeup));
}

#[test]
fn test_duplicate_wake_up_is_ignored() {
    let interrupts = InterruptContext::new();
    let mut station = station(&interrupts, StationConfig::default());
    let now = station.board().now;
    station
        .board_mut()
        .store_timestamp(TimestampKind::LastWakeUp, &TimestampRecord::from_time(&now, false))
        .unwrap();
    station.flags.set(RequestFlag::Weather);
    station.state = OperatingState::TaskCheck;

    block_on(station.step());
    assert!(!station.flags().contains(RequestFlag::ValidWakeup));
    assert!(!station.flags().contains(RequestFlag::Weather));
    assert_eq!(station.state(), OperatingState::Sleep);
}

#[test]
fn test_afternoon_requests_daily_tasks() {
    let interrupts = InterruptContext::new();
    let mut station = station(&interrupts, StationConfig::default());
    station.board_mut().now = RtcTime::new(2024, 7, 2, 10, 30, 0);

    station.update_additional_requests();
    assert!(station.flags().contains(RequestFlag::Geoloc));
    assert!(station.flags().contains(RequestFlag::ErrorStack));
    assert!(station.flags().contains(RequestFlag::Downlink));

    let mut station = Station::new(MockBoard::new(), &interrupts, StationConfig::default());
    let geoloc = TimestampRecord::from_time(&RtcTime::new(2024, 1, 2, 13, 0, 0), true);
    station
        .board_mut()
        .store_timestamp(TimestampKind::LastGeoloc, &geoloc)
        .unwrap();
    station.board_mut().now = RtcTime::new(2024, 1, 2, 15, 0, 0);
    station.update_additional_requests();
    assert!(!station.flags().contains(RequestFlag::Geoloc));
    assert!(station.status().get(StatusBit::DailyGeoloc));
}

#[test]
fn test_rtc_failure_invalidates_wake_up() {
    let interrupts = InterruptContext::new();
    let mut station = station(&interrupts, StationConfig::default());
    station.board_mut().rtc_fails = true;
    station.flags.set(RequestFlag::ValidWakeup);

    station.update_additional_requests();
    assert!(!station.flags().contains(RequestFlag::ValidWakeup));
    assert_eq!(station.errors().iter().last(), Some(&ErrorCode(0x0301)));
}

#[test]
fn test_low_supercap_drops_frames() {
    let interrupts = InterruptContext::new();
    let mut station = station(&interrupts, StationConfig::default());
    station.board_mut().supercap_voltage.set_fallback(Ok(900));
    station.state = OperatingState::Measure;
    block_on(station.step());
    assert!(!station.gates().radio_enabled());
    assert!(!station.gates().reporting_enabled());

    let frame = UplinkFrame::Startup(StartupFrame {
        reset_reason: 0,
        firmware: station.config().firmware,
    });
    assert!(!block_on(station.send(frame, BitRate::Bps600, false)));
    assert!(station.board().sent.is_empty());

    // 1400 mV is inside the hysteresis band.
    station.board_mut().supercap_voltage.set_fallback(Ok(1400));
    station.state = OperatingState::Measure;
    block_on(station.step());
    assert!(!station.gates().radio_enabled());

    station.board_mut().supercap_voltage.set_fallback(Ok(1600));
    station.state = OperatingState::Measure;
    block_on(station.step());
    assert!(station.gates().radio_enabled());
    assert!(block_on(station.send(frame, BitRate::Bps600, false)));
}

#[test]
fn test_error_stack_cleared_only_when_sent() {
    let interrupts = InterruptContext::new();
    let mut station = station(&interrupts, StationConfig::default());
    station.errors.push(ErrorCode::new(ErrorSource::PressureSensor, 0x02));
    station.board_mut().radio.push(Err(HalError::Radio(0x01)));
    station.flags.set(RequestFlag::ErrorStack);
    station.state = OperatingState::ErrorStack;

    block_on(station.step());
    assert_eq!(station.state(), OperatingState::RtcCalibration);
    assert_eq!(station.errors().len(), 2);
    assert!(!station.flags().contains(RequestFlag::ErrorStack));

    station.board_mut().library_errors.push_back(0x42);
    station.flags.set(RequestFlag::ErrorStack);
    station.state = OperatingState::ErrorStack;
    block_on(station.step());
    assert!(station.errors().is_empty());

    let sent = station.board().sent.last().unwrap();
    let UplinkFrame::ErrorStack(frame) = UplinkFrame::decode(&sent.payload).unwrap() else {
        panic!("expected an error stack frame");
    };
    assert_eq!(
        &frame.codes[..4],
        &[
            ErrorCode(0x0802),
            ErrorCode(0x0B01),
            ErrorCode(0x0C42),
            ErrorCode::SUCCESS
        ]
    );
}

#[test]
fn test_error_stack_frame_not_sent_when_empty() {
    let interrupts = InterruptContext::new();
    let mut station = station(&interrupts, StationConfig::default());
    station.flags.set(RequestFlag::ErrorStack);
    station.state = OperatingState::ErrorStack;
    block_on(station.step());
    assert!(station.board().sent.is_empty());
}

#[test]
fn test_power_on_calibration_discards_alarm() {
    let interrupts = InterruptContext::new();
    let mut station = station(&interrupts, StationConfig::default());
    let utc = RtcTime::new(2024, 3, 5, 8, 30, 12);
    station.board_mut().gnss_time.push(Ok(Acquisition::success(utc, 35)));
    station.state = OperatingState::RtcCalibration;
    station.flags.set(RequestFlag::Measure);
    station.flags.set(RequestFlag::Weather);
    interrupts.on_sharp_hour_alarm(5);

    block_on(station.step());
    assert_eq!(station.state(), OperatingState::TaskEnd);
    for flag in [
        RequestFlag::Measure,
        RequestFlag::Weather,
        RequestFlag::SharpHourAlarm,
        RequestFlag::FirstSharpHourAlarm,
        RequestFlag::RtcCalibration,
    ] {
        assert!(!station.flags().contains(flag), "{:?} still set", flag);
    }
    assert!(!interrupts.take().sharp_hour_alarm);
    assert!(station.status().get(StatusBit::FirstRtcCalibration));
    assert!(station.status().get(StatusBit::DailyRtcCalibration));
    assert_eq!(station.board().now, utc);

    let record = station.board_mut().load_timestamp(TimestampKind::LastWakeUp).unwrap();
    assert_eq!(
        (record.year, record.month, record.date, record.hours, record.minutes),
        (2024, 3, 5, 8, 30)
    );
}

#[test]
fn test_later_calibration_keeps_alarm() {
    let interrupts = InterruptContext::new();
    let mut station = station(&interrupts, StationConfig::default());
    station.por_pending = false;
    station.flags.set(RequestFlag::Weather);
    station.state = OperatingState::RtcCalibration;
    block_on(station.step());
    assert!(station.flags().contains(RequestFlag::Weather));
    assert!(!station.status().get(StatusBit::DailyRtcCalibration));
}

#[test]
fn test_geoloc_timeout_frame() {
    let interrupts = InterruptContext::new();
    let mut station = station(&interrupts, StationConfig::default());
    station.flags.set(RequestFlag::Geoloc);
    station.state = OperatingState::Geoloc;
    block_on(station.step());
    assert_eq!(station.state(), OperatingState::ErrorStack);
    let sent = station.board().sent.last().unwrap();
    assert_eq!(sent.payload, [AcquisitionStatus::Timeout as u8, 120]);
    assert!(!station.status().get(StatusBit::DailyGeoloc));
    assert!(!station.flags().contains(RequestFlag::Geoloc));
}

#[test]
fn test_geoloc_fix_frame() {
    let interrupts = InterruptContext::new();
    let mut station = station(&interrupts, StationConfig::default());
    let position = GnssPosition {
        latitude_degrees: 43,
        latitude_minutes: 36,
        latitude_seconds: 42_150,
        latitude_north: true,
        longitude_degrees: 1,
        longitude_minutes: 26,
        longitude_seconds: 71_300,
        longitude_east: true,
        altitude_m: 146,
    };
    station
        .board_mut()
        .gnss_position
        .push(Ok(Acquisition::success(position, 300)));
    station.flags.set(RequestFlag::Geoloc);
    station.state = OperatingState::Geoloc;

    block_on(station.step());
    assert_eq!(station.state(), OperatingState::ErrorStack);
    let sent = station.board().sent.last().unwrap();
    assert_eq!(sent.payload.len(), GEOLOC_FRAME_SIZE);
    assert_eq!(sent.bit_rate, BitRate::Bps100);
    let frame = GeolocFrame::decode(&sent.payload).unwrap();
    assert_eq!(frame.position, position);
    assert_eq!(frame.duration_seconds, u8::MAX);
    assert!(station.status().get(StatusBit::DailyGeoloc));
    assert!(!station.flags().contains(RequestFlag::Geoloc));
    assert!(!station.board().enabled_domains.contains(&PowerDomain::Gnss));

    let record = station.board_mut().load_timestamp(TimestampKind::LastGeoloc).unwrap();
    assert_eq!((record.year, record.month, record.date, record.status), (2024, 1, 2, true));
}

#[test]
fn test_intermediate_weather_follows_reporting_gate() {
    let interrupts = InterruptContext::new();
    let mut station = station(&interrupts, StationConfig::default());
    station.set_weather_data_period(WeatherDataPeriod::Minutes10);
    station.flags.clear(RequestFlag::RtcCalibration);
    station.flags.set(RequestFlag::FirstSharpHourAlarm);
    station.weather_message_count = 1;
    station.measurements_last_time = 10_000;
    station.gates.update(1400);
    assert!(station.gates().radio_enabled());
    assert!(!station.gates().reporting_enabled());

    station.board_mut().uptime = 700;
    station.state = OperatingState::TaskCheck;
    block_on(station.step());
    assert_eq!(station.state(), OperatingState::Sleep);
    assert_eq!(station.weather_message_count, 2);

    station.gates.update(2100);
    station.board_mut().uptime = 1300;
    station.state = OperatingState::TaskCheck;
    block_on(station.step());
    assert_eq!(station.state(), OperatingState::Weather);
    assert_eq!(station.weather_message_count, 3);

    block_on(station.step());
    assert_eq!(station.board().sent.last().unwrap().bit_rate, BitRate::Bps600);
}

#[test]
fn test_intermediate_weather_stops_at_hourly_count() {
    let interrupts = InterruptContext::new();
    let mut station = station(&interrupts, StationConfig::default());
    station.set_weather_data_period(WeatherDataPeriod::Minutes30);
    station.flags.set(RequestFlag::FirstSharpHourAlarm);
    station.weather_message_count = 2;
    station.measurements_last_time = 10_000;
    station.board_mut().uptime = 5000;
    station.state = OperatingState::TaskCheck;
    block_on(station.step());
    assert_eq!(station.state(), OperatingState::Sleep);
    assert_eq!(station.weather_message_count, 2);
}
