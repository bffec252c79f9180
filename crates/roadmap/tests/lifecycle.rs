//! End-to-end tests over a base directory (create -> update LC -> pointage -> delete)

mod common;

use std::time::SystemTime;

use common::*;
use pretty_assertions::assert_eq;
use roadmap::export::export_xml;
use roadmap::layout::{ARCHIVED_DIR, COLLABORATORS_XML, DELETED_DIR, LC_WORKBOOK, POINTAGE_SHEET};
use roadmap::{
    CellValue, CreateMode, CreateSummary, DataSource, RoadmapOptions, UpdateSummary, XlsxWorkbook,
};

fn modified(path: &std::path::Path) -> SystemTime {
    std::fs::metadata(path).unwrap().modified().unwrap()
}

fn collaborator_name(path: &std::path::Path) -> CellValue {
    XlsxWorkbook::open(path)
        .unwrap()
        .worksheet(POINTAGE_SHEET)
        .unwrap()
        .value_at("B1")
        .unwrap()
}

fn validation_count(path: &std::path::Path) -> usize {
    XlsxWorkbook::open(path)
        .unwrap()
        .worksheet(POINTAGE_SHEET)
        .unwrap()
        .data_validations()
        .len()
}

// ===== Create =====

#[test]
fn test_create_sequential() {
    let base = BaseDir::new();
    base.write_collaborators(&["Dana Lee", "Sam Patel"]);
    let manager = base.manager();
    assert!(manager.is_ready());

    let summary = manager.create(CreateMode::Sequential, false).unwrap();
    assert_eq!(
        summary,
        CreateSummary {
            existing: 0,
            created: 2,
            failed: 0
        }
    );

    assert_eq!(
        file_names(&base.interfaces_dir()),
        vec!["RM_Dana Lee.xlsx", "RM_Sam Patel.xlsx"]
    );
    assert_eq!(collaborator_name(&base.interface("Dana Lee")), CellValue::text("Dana Lee"));
    assert_eq!(collaborator_name(&base.interface("Sam Patel")), CellValue::text("Sam Patel"));
    assert_eq!(validation_count(&base.interface("Dana Lee")), 4);
    // Handoff consumed
    assert!(!base.path().join(COLLABORATORS_XML).exists());
}

#[test]
fn test_create_parallel_matches_sequential() {
    let base = BaseDir::new();
    let names = ["Ana", "Ben", "Chloé", "Dev", "Eli"];
    base.write_collaborators(&names);
    let options = RoadmapOptions {
        max_workers: 2,
        ..RoadmapOptions::default()
    };

    let summary = base
        .manager_with(options)
        .create(CreateMode::Parallel, false)
        .unwrap();
    assert_eq!(summary.created, 5);
    for name in names {
        assert_eq!(collaborator_name(&base.interface(name)), CellValue::text(name));
    }
}

#[test]
fn test_create_parallel_with_zero_workers() {
    let base = BaseDir::new();
    base.write_collaborators(&["Dana Lee"]);
    let options = RoadmapOptions {
        max_workers: 0,
        ..RoadmapOptions::default()
    };

    let summary = base.manager_with(options).create_interfaces_fast().unwrap();
    assert_eq!(summary.created, 1);
}

#[test]
fn test_create_in_place() {
    let base = BaseDir::new();
    base.write_collaborators(&["Dana Lee"]);

    let summary = base.manager().create(CreateMode::InPlace, false).unwrap();
    assert_eq!(summary.created, 1);
    assert_eq!(collaborator_name(&base.interface("Dana Lee")), CellValue::text("Dana Lee"));
    assert_eq!(validation_count(&base.interface("Dana Lee")), 4);
}

#[test]
fn test_create_is_idempotent() {
    let base = BaseDir::new();
    base.write_collaborators(&["Dana Lee", "Sam Patel"]);
    base.manager().create_interfaces().unwrap();
    let before = modified(&base.interface("Dana Lee"));

    base.write_collaborators(&["Dana Lee", "Sam Patel"]);
    let summary = base.manager().create_interfaces().unwrap();

    assert_eq!(
        summary,
        CreateSummary {
            existing: 2,
            created: 0,
            failed: 0
        }
    );
    assert_eq!(modified(&base.interface("Dana Lee")), before);
}

#[test]
fn test_create_only_missing_and_skips_duplicates() {
    let base = BaseDir::new();
    base.write_interface("Dana Lee", None, &[&["S01"]]);
    base.write_collaborators(&["Dana Lee", "Sam Patel", "Sam Patel"]);

    let summary = base.manager().create_interfaces().unwrap();
    assert_eq!(summary.existing, 1);
    assert_eq!(summary.created, 1);

    // Existing interface kept its POINTAGE rows
    let sheet = XlsxWorkbook::open(base.interface("Dana Lee"))
        .unwrap()
        .worksheet(POINTAGE_SHEET)
        .unwrap();
    assert_eq!(sheet.value_at("A4").unwrap(), CellValue::text("S01"));
}

#[test]
fn test_create_without_collaborators() {
    let base = BaseDir::new();
    let summary = base.manager().create_interfaces().unwrap();
    assert_eq!(summary, CreateSummary::default());
    assert!(file_names(&base.interfaces_dir()).is_empty());
}

#[test]
fn test_create_with_archive_snapshots_existing() {
    let base = BaseDir::new();
    base.write_interface("Old", None, &[]);
    base.write_collaborators(&["Dana Lee"]);

    let summary = base.manager().create(CreateMode::Sequential, true).unwrap();
    assert_eq!(summary.created, 1);

    let archives = file_names(&base.path().join(ARCHIVED_DIR));
    assert_eq!(archives.len(), 1);
    assert!(archives[0].starts_with("Archive_RM_Collaborateurs_"));
    assert_eq!(
        zip_entries(&base.path().join(ARCHIVED_DIR).join(&archives[0])),
        vec!["RM_Collaborateurs/RM_Old.xlsx"]
    );
    // Snapshot only: nothing removed
    assert!(base.interface("Old").exists());
}

#[test]
fn test_create_with_archive_and_nothing_missing() {
    let base = BaseDir::new();
    base.write_interface("Dana Lee", None, &[]);
    base.write_collaborators(&["Dana Lee"]);

    let summary = base.manager().create(CreateMode::Sequential, true).unwrap();
    assert_eq!(
        summary,
        CreateSummary {
            existing: 1,
            ..CreateSummary::default()
        }
    );
    assert!(file_names(&base.path().join(ARCHIVED_DIR)).is_empty());
    assert!(base.interface("Dana Lee").exists());
}

#[test]
fn test_create_drops_extension_validations_of_template() {
    let base = BaseDir::new();
    write_template_with_extension_validations(&base.template());
    assert!(pointage_xml(&base.template()).contains("<x14:dataValidations"));
    base.write_collaborators(&["Dana Lee"]);

    base.manager().create_interfaces().unwrap();
    let interface = base.interface("Dana Lee");
    assert_eq!(
        validation_targets(&interface),
        vec!["D3:D1000", "E3:E1000", "F3:F1000", "G3:G1000"]
    );
    assert!(!pointage_xml(&interface).contains("x14:dataValidation"));
}

#[test]
fn test_broken_template_fails_each_file() {
    let base = BaseDir::new();
    std::fs::write(base.template(), b"not a workbook").unwrap();
    base.write_collaborators(&["Dana Lee", "Sam Patel"]);

    let summary = base.manager().create_interfaces().unwrap();
    assert_eq!(summary.created, 0);
    assert_eq!(summary.failed, 2);
    assert!(file_names(&base.interfaces_dir()).is_empty());
}

// ===== Update LC =====

#[test]
fn test_update_lc_replaces_rows() {
    let base = BaseDir::new();
    base.write_collaborators(&["Dana Lee"]);
    let manager = base.manager();
    manager.create_interfaces().unwrap();

    base.write_lc_workbook(&[
        lc_row("K1"),
        lc_row("K2"),
        lc_row("K3"),
        lc_row("K4"),
        lc_row("K5"),
    ]);
    let summary = manager.update_lc().unwrap();
    assert_eq!(
        summary,
        UpdateSummary {
            updated: 2,
            skipped: 0,
            failed: 0
        }
    );
    assert!(!base.path().join(LC_WORKBOOK).exists());
    assert_eq!(
        lc_column_b(&base.interface("Dana Lee"), 2),
        vec!["K1", "K2", "K3", "K4", "K5"]
    );

    // A shorter table leaves no stale rows behind
    base.write_lc_workbook(&[lc_row("N1"), lc_row("N2")]);
    manager.update_lc().unwrap();
    assert_eq!(lc_column_b(&base.interface("Dana Lee"), 2), vec!["N1", "N2"]);
    assert_eq!(lc_column_b(&base.template(), 2), vec!["N1", "N2"]);
    assert_eq!(validation_count(&base.interface("Dana Lee")), 4);
}

#[test]
fn test_update_lc_rebuilds_template_validations() {
    let base = BaseDir::new();
    write_template_with_extension_validations(&base.template());
    assert!(validation_targets(&base.template()).is_empty());
    base.write_lc_workbook(&[lc_row("K1"), lc_row("K2")]);

    let summary = base.manager().update_lc().unwrap();
    assert_eq!(summary.updated, 1);
    assert_eq!(
        validation_targets(&base.template()),
        vec!["D3:D1000", "E3:E1000", "F3:F1000", "G3:G1000"]
    );
    assert!(!pointage_xml(&base.template()).contains("x14:dataValidation"));
    assert_eq!(lc_column_b(&base.template(), 2), vec!["K1", "K2"]);
}

#[test]
fn test_create_then_update_lc_keeps_one_validation_set() {
    let base = BaseDir::new();
    write_template_with_extension_validations(&base.template());
    base.write_collaborators(&["Dana Lee"]);
    let manager = base.manager();
    manager.create_interfaces().unwrap();

    base.write_lc_workbook(&[lc_row("K1")]);
    manager.update_lc().unwrap();

    for path in [base.template(), base.interface("Dana Lee")] {
        assert_eq!(validation_count(&path), 4);
        assert!(!pointage_xml(&path).contains("x14:dataValidation"));
    }
}

#[test]
fn test_update_lc_without_data_changes_nothing() {
    let base = BaseDir::new();
    let before = std::fs::read(base.template()).unwrap();

    assert_eq!(base.manager().update_lc().unwrap(), UpdateSummary::default());
    assert_eq!(std::fs::read(base.template()).unwrap(), before);
}

#[test]
fn test_update_lc_skips_files_without_lc() {
    let base = BaseDir::new();
    std::fs::create_dir_all(base.interfaces_dir()).unwrap();
    let odd = base.interface("Odd");
    XlsxWorkbook::blank(&[POINTAGE_SHEET]).unwrap().save(&odd).unwrap();
    let before = std::fs::read(&odd).unwrap();
    base.write_lc_workbook(&[lc_row("K1")]);

    let summary = base.manager().update_lc().unwrap();
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(std::fs::read(&odd).unwrap(), before);
}

#[test]
fn test_master_source() {
    let base = BaseDir::new();
    write_master(&base.master(), &["Dana Lee", "Sam Patel"], &[lc_row("M1"), lc_row("M2")]);
    let options = RoadmapOptions {
        source: DataSource::Master,
        ..RoadmapOptions::default()
    };
    let manager = base.manager_with(options);

    assert_eq!(manager.collaborators(), vec!["Dana Lee", "Sam Patel"]);
    assert_eq!(manager.create_interfaces().unwrap().created, 2);

    let summary = manager.update_lc().unwrap();
    assert_eq!(summary.updated, 3);
    assert_eq!(lc_column_b(&base.interface("Sam Patel"), 3), vec!["M1", "M2"]);
    // Master workbook is never consumed
    assert!(base.master().exists());
}

// ===== Pointage =====

#[test]
fn test_pointage_exports_all_files() {
    let base = BaseDir::new();
    base.write_interface("Dana Lee", Some(37.5), &[&["S01", "", "", "KEY-1"], &["S02"]]);
    base.write_interface("Sam Patel", None, &[&["S03"]]);
    let manager = base.manager();

    assert!(manager.pointage(None).unwrap());

    let xml = std::fs::read_to_string(manager.pointage_output()).unwrap();
    assert_eq!(xml.matches("<row>").count(), 3);
    assert!(xml.starts_with(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<rows><row><col1>S01</col1>"
    ));
    assert!(xml.contains("<col4>KEY-1</col4>"));
    assert!(xml.contains("<col12>37.5</col12>"));
    assert!(xml.ends_with(concat!(
        "<row><col1>S03</col1><col2></col2><col3></col3><col4></col4><col5></col5>",
        "<col6></col6><col7></col7><col8></col8><col9></col9><col10></col10>",
        "<col11></col11><col12>0</col12></row></rows>"
    )));
}

#[test]
fn test_pointage_exports_dates_and_times() {
    let base = BaseDir::new();
    base.write_interface_with("Dana Lee", |workbook, sheet| {
        let date = workbook.style_with_number_format(0, 14).unwrap();
        let datetime = workbook.style_with_number_format(0, 22).unwrap();
        let clock = workbook.style_with_number_format(0, 20).unwrap();
        sheet.set_value_with_style(0, 10, 45292.0, date);
        sheet.set_value(3, 0, "S01");
        sheet.set_value_with_style(3, 1, 45292.0, date);
        sheet.set_value_with_style(3, 2, 45292.75, datetime);
        sheet.set_value_with_style(3, 3, 0.354_166_666_666_666_7, clock);
        sheet.set_value(3, 7, 7.5);
    });
    let manager = base.manager();

    assert!(manager.pointage(None).unwrap());
    let xml = std::fs::read_to_string(manager.pointage_output()).unwrap();
    assert!(xml.contains(concat!(
        "<row><col1>S01</col1><col2>2024-01-01 00:00:00</col2>",
        "<col3>2024-01-01 18:00:00</col3><col4>08:30:00</col4>"
    )));
    assert!(xml.contains("<col8>7.5</col8>"));
    assert!(xml.contains("<col12>2024-01-01 00:00:00</col12>"));
}

#[test]
fn test_pointage_unlistable_folder_writes_empty_output() {
    let base = BaseDir::new();
    let manager = base.manager();
    std::fs::remove_dir_all(base.interfaces_dir()).unwrap();
    std::fs::write(base.interfaces_dir(), b"not a folder").unwrap();
    std::fs::write(manager.pointage_output(), "stale").unwrap();

    assert!(!manager.pointage(None).unwrap());
    assert_eq!(
        std::fs::read_to_string(manager.pointage_output()).unwrap(),
        export_xml(&[])
    );
}

#[test]
fn test_pointage_single_choice() {
    let base = BaseDir::new();
    base.write_interface("Dana Lee", None, &[&["S01"]]);
    base.write_interface("Sam Patel", None, &[&["S03"]]);
    let manager = base.manager();

    assert!(manager.pointage(Some(2)).unwrap());
    let xml = std::fs::read_to_string(manager.pointage_output()).unwrap();
    assert!(xml.contains("S03"));
    assert!(!xml.contains("S01"));

    // Out of range: empty export
    assert!(!manager.pointage(Some(3)).unwrap());
    assert_eq!(
        std::fs::read_to_string(manager.pointage_output()).unwrap(),
        export_xml(&[])
    );
}

#[test]
fn test_pointage_always_writes_output() {
    let base = BaseDir::new();
    let manager = base.manager();

    // No interface files
    assert!(!manager.pointage(None).unwrap());
    assert_eq!(
        std::fs::read_to_string(manager.pointage_output()).unwrap(),
        export_xml(&[])
    );

    // Interface files without rows
    base.write_interface("Dana Lee", Some(8.0), &[]);
    std::fs::write(manager.pointage_output(), "stale").unwrap();
    assert!(!manager.pointage(None).unwrap());
    assert_eq!(
        std::fs::read_to_string(manager.pointage_output()).unwrap(),
        export_xml(&[])
    );
}

#[test]
fn test_pointage_skips_unreadable_files() {
    let base = BaseDir::new();
    std::fs::create_dir_all(base.interfaces_dir()).unwrap();
    std::fs::write(base.interface("Broken"), b"garbage").unwrap();
    base.write_interface("Sam Patel", None, &[&["S03"]]);
    // Lock files are ignored
    std::fs::write(base.interfaces_dir().join("~$RM_Sam Patel.xlsx"), b"lock").unwrap();

    let manager = base.manager();
    assert!(manager.pointage(None).unwrap());
    let xml = std::fs::read_to_string(manager.pointage_output()).unwrap();
    assert_eq!(xml.matches("<row>").count(), 1);
}

// ===== Delete =====

#[test]
fn test_delete_with_archive() {
    let base = BaseDir::new();
    base.write_interface("Dana Lee", None, &[]);
    base.write_interface("Sam Patel", None, &[]);

    base.manager().delete_and_archive_interfaces(true).unwrap();

    assert!(!base.interfaces_dir().exists());
    let expected = vec![
        "RM_Collaborateurs/RM_Dana Lee.xlsx",
        "RM_Collaborateurs/RM_Sam Patel.xlsx",
    ];
    let deleted = file_names(&base.path().join(DELETED_DIR));
    assert_eq!(deleted.len(), 1);
    assert!(deleted[0].starts_with("Deleted_RM_Collaborateurs_"));
    assert_eq!(zip_entries(&base.path().join(DELETED_DIR).join(&deleted[0])), expected);

    let archived = file_names(&base.path().join(ARCHIVED_DIR));
    assert_eq!(archived.len(), 1);
    assert_eq!(zip_entries(&base.path().join(ARCHIVED_DIR).join(&archived[0])), expected);
}

#[test]
fn test_delete_without_archive() {
    let base = BaseDir::new();
    base.write_interface("Dana Lee", None, &[]);

    base.manager().delete_and_archive_interfaces(false).unwrap();

    assert!(!base.interfaces_dir().exists());
    assert_eq!(file_names(&base.path().join(DELETED_DIR)).len(), 1);
    assert!(file_names(&base.path().join(ARCHIVED_DIR)).is_empty());
}

#[test]
fn test_delete_keeps_folder_when_archive_fails() {
    let base = BaseDir::new();
    base.write_interface("Dana Lee", None, &[]);
    let manager = base.manager();
    // Archive destination replaced by a plain file
    let archived = base.path().join(ARCHIVED_DIR);
    std::fs::remove_dir(&archived).unwrap();
    std::fs::write(&archived, b"").unwrap();

    manager.delete_and_archive_interfaces(true).unwrap();

    assert!(base.interface("Dana Lee").exists());
    assert!(file_names(&base.path().join(DELETED_DIR)).is_empty());
}

#[test]
fn test_delete_empty_folder() {
    let base = BaseDir::new();
    base.manager().delete_and_archive_interfaces(true).unwrap();

    assert!(!base.interfaces_dir().exists());
    assert!(file_names(&base.path().join(DELETED_DIR)).is_empty());
    assert!(file_names(&base.path().join(ARCHIVED_DIR)).is_empty());
}

// ===== Orphan cleanup =====

#[test]
fn test_delete_missing_collaborators() {
    let base = BaseDir::new();
    base.write_interface("Dana Lee", None, &[]);
    base.write_interface("Gone", None, &[]);
    std::fs::write(base.interfaces_dir().join("~$RM_Gone.xlsx"), b"lock").unwrap();
    base.write_collaborators(&["Dana Lee"]);

    let deleted = base.manager().delete_missing_collaborators().unwrap();

    assert_eq!(deleted, 1);
    assert_eq!(
        file_names(&base.interfaces_dir()),
        vec!["RM_Dana Lee.xlsx", "~$RM_Gone.xlsx"]
    );

    let zips = file_names(&base.path().join(DELETED_DIR));
    assert_eq!(zips.len(), 1);
    assert!(zips[0].starts_with("Deleted_Missing_RM_collaborators_"));
    let entries = zip_entries(&base.path().join(DELETED_DIR).join(&zips[0]));
    assert_eq!(entries.len(), 1);
    assert!(entries[0].ends_with("/RM_Gone.xlsx"));

    // Scratch folder removed
    assert!(!file_names(base.path())
        .iter()
        .any(|name| name.starts_with("missing_collabs_")));
}

#[test]
fn test_delete_missing_collaborators_without_list() {
    let base = BaseDir::new();
    base.write_interface("Dana Lee", None, &[]);

    assert_eq!(base.manager().delete_missing_collaborators().unwrap(), 0);
    assert!(base.interface("Dana Lee").exists());
    assert!(file_names(&base.path().join(DELETED_DIR)).is_empty());
}

#[test]
fn test_delete_missing_collaborators_nothing_to_do() {
    let base = BaseDir::new();
    base.write_interface("Dana Lee", None, &[]);
    base.write_collaborators(&["Dana Lee", "Sam Patel"]);

    assert_eq!(base.manager().delete_missing_collaborators().unwrap(), 0);
    assert!(file_names(&base.path().join(DELETED_DIR)).is_empty());
}

// ===== Readiness =====

#[test]
fn test_missing_master_disables_operations() {
    let base = BaseDir::without_master();
    base.write_collaborators(&["Dana Lee"]);
    base.write_interface("Gone", None, &[&["S01"]]);
    let manager = base.manager();
    assert!(!manager.is_ready());

    assert_eq!(
        manager.create(CreateMode::Parallel, true).unwrap(),
        CreateSummary::default()
    );
    assert!(!manager.pointage(None).unwrap());
    assert_eq!(manager.delete_missing_collaborators().unwrap(), 0);
    manager.delete_and_archive_interfaces(true).unwrap();

    assert!(base.path().join(COLLABORATORS_XML).exists());
    assert!(base.interface("Gone").exists());
    assert!(!manager.pointage_output().exists());
    assert!(file_names(&base.path().join(ARCHIVED_DIR)).is_empty());
}
