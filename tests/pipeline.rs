use release_impact::chart::JsonChartWriter;
use release_impact::config::parse_config;
use release_impact::month::YearMonth;
use release_impact::pipeline::run_all;
use std::fs;
use std::path::Path;

fn month_rows(start: YearMonth, values: &[&str]) -> String {
    let mut csv = String::from("Month,Peak,Gain,Average\nLast 30 Days,\"9,999\",-,500\n");
    for (i, value) in values.iter().enumerate() {
        let month = start.offset(i as i32);
        csv.push_str(&format!("{},\"{}\",-,100\n", month.label(), value));
    }
    csv
}

fn write(path: &Path, content: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn test_franchise_run_writes_charts_and_reports() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().display().to_string().replace('\\', "/");
    let data = dir.path().join("data").join("TheWitcher");

    let before = ["1,000", "1,010", "1,020", "1,030", "1,040", "1,050"];
    let after = ["2,000", "2,010", "2,020", "2,030", "2,040", "2,050"];
    let mut values: Vec<&str> = before.to_vec();
    values.push("1,500");
    values.extend(after);
    write(
        &data.join("Witcher_3_chart_month_data.csv"),
        &month_rows(YearMonth::new(2019, 6).unwrap(), &values),
    );
    write(
        &data.join("Witcher_2_chart_month_data.csv"),
        &month_rows(YearMonth::new(2020, 1).unwrap(), &["10", "11", "12"]),
    );
    write(&data.join("broken.csv"), "Date,Peak\n2020-01,5\n");

    let config = parse_config(&format!(
        r#"{{
            "data_dir": "{root}/data",
            "chart_dir": "{root}/charts",
            "report_dir": "{root}/reports",
            "franchises": [{{
                "media_name": "The Witcher",
                "franchise": "TheWitcher",
                "media_type": "Series",
                "release_dates": {{ "S1": "2019-12-20", "S2": "2021-12-17" }},
                "metric": "Peak",
                "analyses": [{{ "label": "The Witcher (S1)", "event": "S1" }}]
            }}]
        }}"#
    ))
    .unwrap();

    let charts = JsonChartWriter::new(&config.chart_dir);
    let summary = run_all(&config, &charts).unwrap();

    assert_eq!(summary.franchises, 1);
    assert_eq!(summary.franchises_failed, 0);
    assert_eq!(summary.files_seen, 3);
    assert_eq!(summary.files_skipped, 1);
    assert_eq!(summary.reports_written, 2);
    assert_eq!(summary.analyses_skipped, 1);
    // Witcher_3 line chart and box plot; Witcher_2 starts after S1 and is gated out.
    assert_eq!(summary.charts_written, 2);

    let chart_dir = dir.path().join("charts");
    assert!(chart_dir.join("Witcher_3_chart_month_data_peak_analysis.json").is_file());
    assert!(!chart_dir.join("Witcher_2_chart_month_data_peak_analysis.json").exists());
    assert!(chart_dir.join("Witcher_3_chart_month_data_s1_boxplot.json").is_file());

    let chart: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(chart_dir.join("Witcher_3_chart_month_data_peak_analysis.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(chart["lines"][0]["points"].as_array().unwrap().len(), 13);
    assert_eq!(chart["markers"].as_array().unwrap().len(), 2);

    let report_dir = dir.path().join("reports").join("TheWitcher");
    let report = fs::read_to_string(
        report_dir.join("Witcher_3_chart_month_data_the_witcher_s1.txt"),
    )
    .unwrap();
    assert!(report.starts_with("--- Impact analysis: The Witcher (S1) ---"));
    assert!(report.contains("Immediate change: +42.86%"));
    assert!(report.contains("STATISTICALLY SIGNIFICANT"));

    let missing = fs::read_to_string(
        report_dir.join("Witcher_2_chart_month_data_the_witcher_s1.txt"),
    )
    .unwrap();
    assert!(missing.contains("was not found"));
}

#[test]
fn test_combined_mode_writes_one_chart() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().display().to_string().replace('\\', "/");
    let data = dir.path().join("data").join("Fallout");
    write(
        &data.join("Fallout_4.csv"),
        &month_rows(YearMonth::new(2024, 1).unwrap(), &["100", "200", "300"]),
    );
    write(
        &data.join("Fallout_76.csv"),
        &month_rows(YearMonth::new(2024, 3).unwrap(), &["50", "60"]),
    );

    let config = parse_config(&format!(
        r#"{{
            "data_dir": "{root}/data",
            "chart_dir": "{root}/charts",
            "report_dir": "{root}/reports",
            "franchises": [{{
                "media_name": "Fallout",
                "franchise": "Fallout",
                "media_type": "Series",
                "release_dates": "2024-04-10",
                "metric": "Peak",
                "combine": true
            }}]
        }}"#
    ))
    .unwrap();

    let charts = JsonChartWriter::new(&config.chart_dir);
    let summary = run_all(&config, &charts).unwrap();
    assert_eq!(summary.charts_written, 1);
    assert_eq!(summary.reports_written, 0);

    let path = dir.path().join("charts").join("combined_Fallout_peak_analysis.json");
    let chart: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    let lines = chart["lines"].as_array().unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["label"], "Fallout_4");
    assert_eq!(lines[1]["points"].as_array().unwrap().len(), 2);
}
