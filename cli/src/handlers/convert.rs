use console::Style;

pub fn handle_convert(
    input: String,
    output: String,
) -> Result<(), String> {
    let archive = super::open(&input)?;
    archive
        .save_parameters(&output)
        .map_err(|error| format!("failed to write {output}: {error}"))?;

    let count = archive.directory().len();
    println!(
        "{} {count} parameters from {input} to {output}",
        Style::new().green().bold().apply_to("Converted")
    );
    Ok(())
}
