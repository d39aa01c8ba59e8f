//! Property-based tests for the registry, the RACP codec and the
//! measurement decoder.

use gls_core::codec::{
    DateTime, GlucoseMeasurement, MeasurementContext, RacpCommand, RacpOpcode, RacpOperand,
    RacpOperator, SensorStatus,
};
use gls_core::{
    AddressType, BdAddr, ClientConfiguration, ConfigurableCharacteristic, ConnectionId,
    DeviceRegistry, GlsError, GlsServer, ProfileError, RecordingGatt, TransactionId,
};
use proptest::prelude::*;

/// Addresses drawn from a small space so collisions are frequent
fn arb_addr() -> impl Strategy<Value = BdAddr> {
    (0u8..8).prop_map(|last| BdAddr::new([0x00, 0x1B, 0xDC, 0x00, 0x00, last]))
}

fn arb_date_time() -> impl Strategy<Value = DateTime> {
    (1582u16..=9999, 1u8..=12, 1u8..=31, 0u8..=23, 0u8..=59, 0u8..=59)
        .prop_map(|(y, mo, d, h, mi, s)| DateTime::new(y, mo, d, h, mi, s))
}

fn arb_operand(operator: RacpOperator) -> BoxedStrategy<RacpOperand> {
    match operator.operand_values() {
        0 => Just(RacpOperand::None).boxed(),
        1 => prop_oneof![
            any::<u16>().prop_map(RacpOperand::SequenceNumber),
            arb_date_time().prop_map(RacpOperand::UserFacingTime),
        ]
        .boxed(),
        _ => prop_oneof![
            (any::<u16>(), any::<u16>()).prop_map(|(a, b)| RacpOperand::SequenceNumberRange {
                min: a.min(b),
                max: a.max(b),
            }),
            (arb_date_time(), arb_date_time()).prop_map(|(a, b)| {
                RacpOperand::UserFacingTimeRange {
                    min: a.min(b),
                    max: a.max(b),
                }
            }),
        ]
        .boxed(),
    }
}

/// Any command a collector may legally write
fn arb_racp_command() -> impl Strategy<Value = RacpCommand> {
    let operators = prop_oneof![
        Just(RacpOperator::AllRecords),
        Just(RacpOperator::LessThanOrEqualTo),
        Just(RacpOperator::GreaterThanOrEqualTo),
        Just(RacpOperator::WithinRangeOf),
        Just(RacpOperator::FirstRecord),
        Just(RacpOperator::LastRecord),
    ];
    let opcodes = prop_oneof![
        Just(RacpOpcode::ReportStoredRecords),
        Just(RacpOpcode::DeleteStoredRecords),
        Just(RacpOpcode::ReportNumberOfStoredRecords),
    ];

    prop_oneof![
        1 => Just(RacpCommand::abort()),
        9 => (opcodes, operators).prop_flat_map(|(opcode, operator)| {
            arb_operand(operator).prop_map(move |operand| RacpCommand::new(opcode, operator, operand))
        }),
    ]
}

fn arb_measurement() -> impl Strategy<Value = GlucoseMeasurement> {
    (
        any::<u16>(),
        arb_date_time(),
        proptest::option::of(any::<i16>()),
        proptest::option::of(any::<u16>()),
        any::<bool>(),
    )
        .prop_map(|(seq, time, offset, status, follows)| {
            let mut m = GlucoseMeasurement::new(seq, time);
            m.time_offset = offset;
            m.sensor_status = status.map(SensorStatus::new);
            m.context_follows = follows;
            m
        })
}

proptest! {
    /// Property: the registry never holds two records for one address
    #[test]
    fn registry_is_unique(ops in prop::collection::vec((arb_addr(), any::<bool>()), 0..64)) {
        let mut registry = DeviceRegistry::new();
        let mut expected = std::collections::HashSet::new();

        for (addr, create) in ops {
            if create {
                let inserted = registry.create(addr, AddressType::Public);
                prop_assert_eq!(inserted, expected.insert(addr));
            } else {
                let removed = registry.delete(&addr).is_some();
                prop_assert_eq!(removed, expected.remove(&addr));
            }
            prop_assert_eq!(registry.len(), expected.len());
        }

        let addrs = registry.addresses();
        let mut deduped = addrs.clone();
        deduped.dedup();
        prop_assert_eq!(addrs, deduped);
    }

    /// Property: valid RACP commands round-trip through the wire format
    #[test]
    fn racp_command_round_trip(command in arb_racp_command()) {
        prop_assert!(command.validate().is_ok());
        let bytes = command.encode();
        let decoded = RacpCommand::decode(&bytes).expect("valid command decodes");
        prop_assert_eq!(decoded, command);
        prop_assert_eq!(decoded.encode(), bytes);
    }

    /// Property: decoding arbitrary bytes fails cleanly instead of reading
    /// past the buffer
    #[test]
    fn arbitrary_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..32)) {
        let _ = GlucoseMeasurement::decode(&bytes);
        let _ = MeasurementContext::decode(&bytes);
        let _ = RacpCommand::decode(&bytes);
    }

    /// Property: every truncation of a measurement is rejected as malformed
    #[test]
    fn truncated_measurement_is_malformed(measurement in arb_measurement(), cut in any::<prop::sample::Index>()) {
        let bytes = measurement.encode();
        let len = cut.index(bytes.len());
        let result = GlucoseMeasurement::decode(&bytes[..len]);
        prop_assert!(
            matches!(result, Err(GlsError::Profile(ProfileError::MalformedData { .. }))),
            "prefix of {} bytes decoded: {:?}",
            len,
            result
        );
        prop_assert_eq!(GlucoseMeasurement::decode(&bytes).unwrap(), measurement);
    }

    /// Property: aborts never change whether a procedure is outstanding, at
    /// most one non-abort command is accepted until a result is indicated,
    /// and the RACP subscription only matters while idle
    #[test]
    fn racp_exclusivity(
        steps in prop::collection::vec((arb_racp_command(), any::<bool>()), 1..16)
    ) {
        let addr = BdAddr::new([1, 2, 3, 4, 5, 6]);
        let mut registry = DeviceRegistry::new();
        registry.on_connected(addr, AddressType::Public, ConnectionId(1));
        registry.find_mut(&addr).unwrap().server_config.racp = ClientConfiguration::INDICATE;
        let mut gatt = RecordingGatt::new();
        let server = GlsServer::default();

        let mut accepted = 0;
        for (i, (command, subscribed)) in steps.into_iter().enumerate() {
            let racp = if subscribed {
                ClientConfiguration::INDICATE
            } else {
                ClientConfiguration::NONE
            };
            server
                .on_client_configuration_update(
                    &mut registry,
                    &addr,
                    ConfigurableCharacteristic::Racp,
                    racp,
                )
                .unwrap();

            let before = registry.find(&addr).unwrap().racp_outstanding();
            let decision = server
                .on_racp_command(&mut registry, &mut gatt, &addr, TransactionId(i as u32), command)
                .unwrap();
            let after = registry.find(&addr).unwrap().racp_outstanding();

            if before {
                let expected = if command.is_abort() { 0x00 } else { 0x80 };
                prop_assert_eq!(decision.code, expected);
                prop_assert!(after);
            } else if !subscribed {
                prop_assert_eq!(decision.code, 0x81);
                prop_assert!(!after);
            } else if command.is_abort() {
                prop_assert!(decision.accepted());
                prop_assert!(!after);
            } else {
                prop_assert!(decision.accepted());
                prop_assert!(after);
                accepted += 1;
            }
        }
        prop_assert!(accepted <= 1);
    }
}
