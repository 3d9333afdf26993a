//! End-to-end conceal/reveal properties over both strategies.

mod common;

use common::{carrier_with_clinit, field_names, minimal_carrier};
use ghostclass_conceal::{
    conceal_attribute, conceal_sbox, reveal_attribute, reveal_auto, reveal_sbox, verify_emitted,
    GhostError,
};
use ghostclass_classfile::{AttributeInfo, ClassFile};
use proptest::prelude::*;

#[test]
fn attribute_mode_conceals_test_data() {
    let carrier = minimal_carrier("TestClass");
    let payload = b"Test data";

    let concealed = conceal_attribute(&carrier, payload).unwrap();
    assert!(concealed.len() >= carrier.len() + 8);

    // The single GhostPayload attribute holds magic + length + payload.
    let class = ClassFile::parse(&concealed).unwrap();
    let attribute = class.find_attribute(b"GhostPayload").unwrap().unwrap();
    let AttributeInfo::Unknown(content) = &attribute.info else {
        unreachable!("payload attribute must be opaque to the codec");
    };
    assert_eq!(content, &hex::decode("4750480100000009546573742064617461").unwrap());

    assert_eq!(reveal_attribute(&concealed).unwrap(), payload);
    assert_eq!(reveal_auto(&concealed).unwrap(), payload);
}

#[test]
fn attribute_mode_is_deterministic() {
    let carrier = minimal_carrier("Deterministic");
    let first = conceal_attribute(&carrier, b"same payload").unwrap();
    let second = conceal_attribute(&carrier, b"same payload").unwrap();
    assert_eq!(first, second);
}

#[test]
fn attribute_mode_replaces_instead_of_duplicating() {
    let carrier = minimal_carrier("Replaced");
    let once = conceal_attribute(&carrier, b"first payload").unwrap();
    let twice = conceal_attribute(&once, b"second payload").unwrap();

    assert_eq!(reveal_attribute(&twice).unwrap(), b"second payload");

    let class = ClassFile::parse(&twice).unwrap();
    let ghost_count = class
        .attributes
        .iter()
        .filter(|attribute| {
            class.constant_pool.get_utf8(attribute.name_index).unwrap() == b"GhostPayload"
        })
        .count();
    assert_eq!(ghost_count, 1);
}

#[test]
fn sbox_mode_conceals_every_byte_value() {
    let carrier = minimal_carrier("TestClass");
    let payload: Vec<u8> = (0..=255u8).collect();

    let concealed = conceal_sbox(&carrier, &payload).unwrap();
    assert_eq!(reveal_sbox(&concealed).unwrap(), payload);
    assert_eq!(reveal_auto(&concealed).unwrap(), payload);

    // The injected names follow the derivation contract.
    let names = field_names(&concealed);
    let table = names
        .iter()
        .find(|name| name.starts_with("_T") || name.starts_with("_S"))
        .expect("table field injected");
    assert_eq!(table.len(), 3);
    assert!(table.as_bytes()[2].is_ascii_digit());

    let checksum = names
        .iter()
        .find(|name| name.ends_with('k') && name.len() == 3 && name.starts_with('_'))
        .expect("checksum field injected");
    assert!(checksum.as_bytes()[1].is_ascii_lowercase());
}

#[test]
fn sbox_mode_is_nondeterministic_but_stable() {
    let carrier = minimal_carrier("Entropy");
    let payload = b"identical payload";

    let first = conceal_sbox(&carrier, payload).unwrap();
    let second = conceal_sbox(&carrier, payload).unwrap();
    assert_ne!(first, second, "entropy slots must differ between encodes");

    assert_eq!(reveal_sbox(&first).unwrap(), payload);
    assert_eq!(reveal_sbox(&second).unwrap(), payload);
}

#[test]
fn sbox_mode_rejects_oversized_payloads() {
    let carrier = minimal_carrier("TooMuch");
    let payload = vec![0xAB; 1013];
    assert!(matches!(
        conceal_sbox(&carrier, &payload),
        Err(GhostError::Sbox(ghostclass_sbox::SboxError::PayloadTooLarge { size: 1013, .. }))
    ));
}

#[test]
fn sbox_mode_capacity_boundary_round_trips() {
    let carrier = minimal_carrier("Full");
    let payload = vec![0x5A; 1012];
    let concealed = conceal_sbox(&carrier, &payload).unwrap();
    assert_eq!(reveal_sbox(&concealed).unwrap(), payload);
}

#[test]
fn distinct_carriers_get_distinct_field_names() {
    let payload = b"any payload";
    let alpha = conceal_sbox(&minimal_carrier("Alpha"), payload).unwrap();
    let beta = conceal_sbox(&minimal_carrier("Beta"), payload).unwrap();

    let alpha_names: Vec<String> =
        field_names(&alpha).into_iter().filter(|name| name.starts_with('_')).collect();
    let beta_names: Vec<String> =
        field_names(&beta).into_iter().filter(|name| name.starts_with('_')).collect();
    assert_ne!(alpha_names, beta_names);
}

#[test]
fn existing_initializer_survives_as_the_tail() {
    let carrier = carrier_with_clinit("Booted");
    let original = ClassFile::parse(&carrier).unwrap();
    let original_clinit = {
        let index = original.find_method(b"<clinit>", b"()V").unwrap().unwrap();
        original.methods[index].code(&original.constant_pool).unwrap().unwrap().code.clone()
    };

    let concealed = conceal_sbox(&carrier, b"payload behind a real initializer").unwrap();
    assert_eq!(reveal_sbox(&concealed).unwrap(), b"payload behind a real initializer");

    let class = ClassFile::parse(&concealed).unwrap();
    let index = class.find_method(b"<clinit>", b"()V").unwrap().unwrap();
    let code = class.methods[index].code(&class.constant_pool).unwrap().unwrap();
    assert!(
        code.code.ends_with(&original_clinit),
        "the original initializer must run unmodified after the prefix"
    );
}

#[test]
fn clean_carriers_reveal_nothing() {
    let carrier = minimal_carrier("Clean");
    assert_eq!(reveal_attribute(&carrier), Err(GhostError::NoPayload));
    assert_eq!(reveal_sbox(&carrier), Err(GhostError::NoPayload));
    assert_eq!(reveal_auto(&carrier), Err(GhostError::NoPayload));
}

#[test]
fn auto_reveal_prefers_the_sbox_payload() {
    let carrier = minimal_carrier("Stacked");
    let both = conceal_attribute(
        &conceal_sbox(&carrier, b"table payload").unwrap(),
        b"attribute payload",
    )
    .unwrap();

    assert_eq!(reveal_auto(&both).unwrap(), b"table payload");
    assert_eq!(reveal_attribute(&both).unwrap(), b"attribute payload");
}

#[test]
fn both_outputs_pass_structural_verification() {
    let carrier = minimal_carrier("Verified");
    let via_attribute = conceal_attribute(&carrier, b"p").unwrap();
    let via_table = conceal_sbox(&carrier, b"p").unwrap();
    assert_eq!(ghostclass_verify::verify_structural(&via_attribute), Ok(()));
    assert_eq!(ghostclass_verify::verify_structural(&via_table), Ok(()));
}

#[test]
fn host_loader_accepts_concealed_output_when_available() {
    let carrier = carrier_with_clinit("HostChecked");
    let concealed = conceal_sbox(&carrier, b"payload the host must tolerate").unwrap();

    // The host executes the spliced initializer and the original tail,
    // then invokes the carrier's own static method. Machines without a
    // JVM surface HostUnavailable and skip the check; everything else
    // must pass.
    match verify_emitted(&concealed, Some("touch")) {
        Ok(()) | Err(GhostError::HostUnavailable { .. }) => {},
        Err(other) => unreachable!("host rejected the concealed class: {other}"),
    }
}

#[test]
fn verify_emitted_maps_gateway_failures() {
    // Structural damage comes back as VerifyFailed with diagnostics.
    let mut class = ClassFile::parse(&minimal_carrier("Sound")).unwrap();
    class.this_class = 999;
    let bytes = class.serialize().unwrap();
    assert!(matches!(
        verify_emitted(&bytes, None),
        Err(GhostError::VerifyFailed { .. })
    ));

    // Unparseable bytes come back as a carrier parse error.
    assert!(matches!(
        verify_emitted(&[0xCA, 0xFE], None),
        Err(GhostError::ClassFile(_))
    ));
}

#[test]
fn unparseable_carriers_fail_loudly() {
    let garbage = [0xCA, 0xFE, 0xBA];
    assert!(matches!(
        conceal_attribute(&garbage, b"p"),
        Err(GhostError::ClassFile(_))
    ));
    assert!(matches!(reveal_auto(&garbage), Err(GhostError::ClassFile(_))));
}

#[test]
fn prop_attribute_round_trip() {
    proptest!(|(payload in prop::collection::vec(any::<u8>(), 0..2048))| {
        let carrier = minimal_carrier("PropAttr");
        let concealed = conceal_attribute(&carrier, &payload).unwrap();
        prop_assert_eq!(reveal_attribute(&concealed).unwrap(), payload);
    });
}

#[test]
fn prop_sbox_round_trip() {
    proptest!(ProptestConfig::with_cases(48), |(payload in prop::collection::vec(any::<u8>(), 0..=1012))| {
        let carrier = minimal_carrier("PropTable");
        let concealed = conceal_sbox(&carrier, &payload).unwrap();
        let revealed = reveal_sbox(&concealed).unwrap();
        prop_assert_eq!(&revealed, &payload);
        prop_assert_eq!(reveal_auto(&concealed).unwrap(), payload);
    });
}
