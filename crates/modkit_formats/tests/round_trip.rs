use modkit_formats::aura::{AuraEffect, AuraEntry, AuraFlags, AuraTable};
use modkit_formats::chara::{CharaEntry, CharaTable, DlcFlags};
use modkit_formats::cue::{CueEntry, CueTable};
use modkit_formats::error::Result;
use modkit_formats::lookup::{BgmLookupEntry, BgmLookupTable};
use modkit_formats::message::{MessageEntry, MessageTable};
use modkit_formats::partner::{
    AiBehavior, OutfitPart, PartnerAiTable, PartnerEntry, PartnerOutfitTable, PartnerSkillTable,
    SkillSlot,
};
use modkit_formats::{AnyTable, TableKind};
use pretty_assertions::assert_eq;
use tracing::{info, instrument};
use tracing_test::traced_test;

fn samples() -> Vec<AnyTable> {
    vec![
        AuraTable::new(vec![
            AuraEntry {
                id: 3,
                flags: AuraFlags::GLARE | AuraFlags::PERSIST_IDLE,
                effects: vec![AuraEffect {
                    kind: 1,
                    effect_id: 42,
                }],
            },
            AuraEntry {
                id: 0,
                flags: AuraFlags::empty(),
                effects: vec![],
            },
        ])
        .into(),
        CharaTable::new(vec![CharaEntry {
            id: 9,
            short_name: "GKU".into(),
            dlc: DlcFlags::EXTRA_PACK_2,
            model_path: Some("chara/GKU".into()),
        }])
        .into(),
        MessageTable::new(vec![
            MessageEntry {
                id: 1,
                name: "BGM_NAME_501".into(),
                text: Some("Cha-La Head-Cha-La".into()),
            },
            MessageEntry {
                id: 0,
                name: "BGM_NAME_500".into(),
                text: None,
            },
        ])
        .into(),
        CueTable::new(vec![
            CueEntry::stream(502, "ending"),
            CueEntry::stream(500, "title"),
        ])
        .into(),
        BgmLookupTable::new(vec![BgmLookupEntry {
            slot: 0,
            cue_id: 500,
            name: Some("title".into()),
        }])
        .into(),
        PartnerSkillTable::new(vec![
            PartnerEntry::new(
                2,
                0,
                vec![SkillSlot {
                    skill_id: 77,
                    level: 1,
                    slot: 0,
                }],
            ),
            PartnerEntry::new(1, 1, vec![]),
        ])
        .into(),
        PartnerOutfitTable::new(vec![PartnerEntry::new(
            4,
            0,
            vec![
                OutfitPart {
                    part: 0,
                    model_id: 100,
                    color: 0xFF00FF,
                },
                OutfitPart {
                    part: 1,
                    model_id: 101,
                    color: 0,
                },
            ],
        )])
        .into(),
        PartnerAiTable::new(vec![PartnerEntry::new(
            1,
            0,
            vec![AiBehavior { behavior_id: 5 }],
        )])
        .into(),
    ]
}

#[instrument(skip_all, fields(kind = %table.kind()))]
fn check_canonical(table: &AnyTable) -> Result<()> {
    let first = table.encode()?;
    let decoded = AnyTable::decode(&first)?;

    let mut canonical = table.clone();
    canonical.canonicalize()?;
    assert_eq!(decoded, canonical);

    let second = decoded.encode()?;
    assert_eq!(first, second);
    info!(len = first.len(), "canonical encode is stable");
    Ok(())
}

#[traced_test]
#[test]
fn canonical_encode_is_stable() -> Result<()> {
    for table in samples() {
        check_canonical(&table)?;
    }
    Ok(())
}

#[traced_test]
#[test]
fn empty_tables_are_bare_headers() -> Result<()> {
    for kind in TableKind::ALL {
        let out = AnyTable::empty(*kind).encode()?;
        assert_eq!(out.len(), 0x20, "{kind}");
        assert_eq!(&out[..4], &kind.signature());
        // entry count, then sub entry count, sub entry offset and reserved
        assert_eq!(&out[0x0C..0x10], &[0u8; 4], "{kind}");
        assert_eq!(&out[0x14..], &[0u8; 12], "{kind}");
        assert!(AnyTable::decode(&out)?.is_empty());
    }
    Ok(())
}

#[test]
fn sorting_is_idempotent() -> Result<()> {
    for table in samples() {
        let mut once = table.clone();
        once.canonicalize()?;
        let mut twice = once.clone();
        twice.canonicalize()?;
        assert_eq!(once.rows(), twice.rows());
    }
    Ok(())
}
