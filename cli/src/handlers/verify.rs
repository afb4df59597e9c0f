use console::Style;
use paramdir::compare_parameters;

pub fn handle_verify(
    expected: String,
    actual: String,
) -> Result<(), String> {
    let expected_archive = super::open(&expected)?;
    let actual_archive = super::open(&actual)?;
    let mismatches =
        compare_parameters(expected_archive.directory(), actual_archive.directory());

    if mismatches.is_empty() {
        println!(
            "{} {} parameters match",
            Style::new().green().bold().apply_to("OK"),
            expected_archive.directory().len()
        );
        return Ok(());
    }

    let style_path = Style::new().yellow();
    for mismatch in &mismatches {
        println!("  {} {mismatch}", style_path.apply_to("~"));
    }
    Err(format!(
        "{} mismatching parameters between {expected} and {actual}",
        mismatches.len()
    ))
}
