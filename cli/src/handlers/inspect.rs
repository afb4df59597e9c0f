use console::Style;
use paramdir::DataType;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ParameterSummary {
    name: String,
    data_type: DataType,
    shape: Vec<usize>,
    need_grad: bool,
    size_in_bytes: usize,
}

fn format_table(parameters: &[ParameterSummary]) -> String {
    let style_header = Style::new().bold();
    let style_dtype = Style::new().cyan();
    let name_width =
        parameters.iter().map(|p| p.name.len()).max().unwrap_or(0).max("name".len());

    let mut lines = vec![style_header
        .apply_to(format!(
            "{:name_width$}  {:8}  {:>10}  {:9}  shape",
            "name", "dtype", "bytes", "need_grad"
        ))
        .to_string()];
    for parameter in parameters {
        lines.push(format!(
            "{:name_width$}  {}  {:>10}  {:9}  {:?}",
            parameter.name,
            style_dtype.apply_to(format!("{:8}", parameter.data_type.name())),
            parameter.size_in_bytes,
            parameter.need_grad,
            parameter.shape,
        ));
    }
    let total: usize = parameters.iter().map(|p| p.size_in_bytes).sum();
    lines.push(format!("{} parameters, {total} bytes", parameters.len()));
    lines.join("\n")
}

pub fn handle_inspect(
    path: String,
    json: bool,
) -> Result<(), String> {
    let archive = super::open(&path)?;
    let parameters: Vec<ParameterSummary> = archive
        .get_parameters()
        .into_iter()
        .map(|(name, variable)| {
            let variable = variable.borrow();
            ParameterSummary {
                name,
                data_type: variable.data().data_type(),
                shape: variable.data().shape().to_vec(),
                need_grad: variable.need_grad(),
                size_in_bytes: variable.data().size_in_bytes(),
            }
        })
        .collect();

    if json {
        let document = serde_json::to_string_pretty(&parameters)
            .map_err(|error| format!("failed to serialize summary: {error}"))?;
        println!("{document}");
    } else {
        println!("{}", format_table(&parameters));
    }
    Ok(())
}
