//! Sequence text through the parser for every kind of sequence

use fami_expansion::instrument::{
    encode_arp_scheme, ArpScheme, InstrumentType, Sequence, SequenceSetting, SequenceType,
};
use fami_expansion::sequence_text::{conversion_for, SequenceParser};

fn parser(kind: SequenceType, setting: SequenceSetting, family: InstrumentType) -> SequenceParser {
    SequenceParser::for_sequence(kind, setting, family)
}

/// Parse then print, for text the conversion prints back verbatim
fn normalize(kind: SequenceType, setting: SequenceSetting, family: InstrumentType, text: &str) -> String {
    let mut p = parser(kind, setting, family);
    let mut seq = Sequence::new(setting);
    let report = p.parse(&mut seq, text);
    assert!(report.is_clean(), "{text}: {report:?}");
    p.print(&seq)
}

#[test]
fn canonical_text_prints_back_unchanged() {
    use InstrumentType::*;
    use SequenceSetting::*;
    use SequenceType::*;

    let cases = [
        (Volume, Default, Apu, "15 12 | 8 / 4 0"),
        (Arpeggio, Default, Apu, "0 12 -12 | 7"),
        (Arpeggio, Relative, N163, "| 1 -1"),
        (Arpeggio, Scheme, Vrc6, "x y+3 -y-2 12 | 0"),
        (Arpeggio, Fixed, N163, "C-4 E-4 G-4 / B-7"),
        (Pitch, Default, N163, "-128 0 127"),
        (HiPitch, Absolute, Apu, "3 / -3"),
        (Duty, Default, N163, "0 63 | 12"),
        (Duty, Default, S5b, "15tn 0t 31e"),
    ];
    for (kind, setting, family, text) in cases {
        assert_eq!(normalize(kind, setting, family, text), text);
    }
}

#[test]
fn shorthand_expands() {
    assert_eq!(
        normalize(
            SequenceType::Volume,
            SequenceSetting::Default,
            InstrumentType::Apu,
            "15'2 | 12:1:10 $A"
        ),
        "15 15 | 12 11 10 10"
    );
    assert_eq!(
        normalize(
            SequenceType::Arpeggio,
            SequenceSetting::Fixed,
            InstrumentType::N163,
            "48 E#4 Cb5"
        ),
        "C-4 F-4 B-4"
    );
}

#[test]
fn scheme_items_decode_to_effect_nibbles() {
    let mut p = parser(SequenceType::Arpeggio, SequenceSetting::Scheme, InstrumentType::Apu);
    let mut seq = Sequence::new(SequenceSetting::Scheme);
    p.parse(&mut seq, "0 x y-1 -y+12");
    assert_eq!(
        seq.items(),
        &[
            encode_arp_scheme(0, ArpScheme::None),
            encode_arp_scheme(0, ArpScheme::X),
            encode_arp_scheme(-1, ArpScheme::Y),
            encode_arp_scheme(12, ArpScheme::NegY),
        ]
    );
}

#[test]
fn bad_terms_do_not_disturb_neighbours() {
    let mut p = parser(SequenceType::Volume, SequenceSetting::Default, InstrumentType::Apu);
    let mut seq = Sequence::default();
    let report = p.parse(&mut seq, "3'2 7:: 4 x 2'0 1 5:0:9");
    assert_eq!(seq.items(), &[3, 3, 4, 1]);
    assert_eq!(report.skipped, vec!["7::", "x", "2'0", "5:0:9"]);
}

#[test]
fn release_and_loop_at_same_item() {
    let mut p = parser(SequenceType::Volume, SequenceSetting::Default, InstrumentType::Apu);
    let mut seq = Sequence::default();
    p.parse(&mut seq, "1 | / 2");
    assert_eq!(seq.loop_point(), Some(1));
    assert_eq!(seq.release_point(), Some(1));
    assert_eq!(p.print(&seq), "1 | / 2");
}

#[test]
fn empty_text_clears_sequence() {
    let mut p = parser(SequenceType::Volume, SequenceSetting::Default, InstrumentType::Apu);
    let mut seq = Sequence::from_items(&[1, 2]).with_loop(0);
    let report = p.parse(&mut seq, "   ");
    assert!(report.is_clean());
    assert!(seq.is_empty());
    assert_eq!(seq.loop_point(), None);
    assert_eq!(p.print(&seq), "");
}

#[test]
fn custom_conversion() {
    let mut p = SequenceParser::new(conversion_for(
        SequenceType::Duty,
        SequenceSetting::Default,
        InstrumentType::Vrc6,
    ));
    let mut seq = Sequence::default();
    p.parse(&mut seq, "0 9 3");
    assert_eq!(seq.items(), &[0, 7, 3]);
}
