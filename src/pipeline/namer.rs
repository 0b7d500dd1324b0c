use crate::pipeline::PipelineError;

// Single-sided detections assume consecutive left/right pagination across the
// split; a misread detection propagates to the inferred sibling.
pub fn ocr_name_pair(
    left_number: Option<&str>,
    right_number: Option<&str>,
    source_base: &str,
) -> Result<(String, String), PipelineError> {
    match (left_number, right_number) {
        (Some(left), Some(right)) => Ok((format!("{left}.jpg"), format!("{right}.jpg"))),
        (None, Some(right)) => {
            let number = parse_page_number(right)?;
            Ok((format!("{}.jpg", number - 1), format!("{number}.jpg")))
        }
        (Some(left), None) => {
            let number = parse_page_number(left)?;
            Ok((format!("{number}.jpg"), format!("{}.jpg", number + 1)))
        }
        (None, None) => Ok((
            format!("{source_base}_L.jpg"),
            format!("{source_base}_R.jpg"),
        )),
    }
}

pub fn sequential_name_pair(source_base: &str) -> (String, String) {
    (
        format!("{source_base}_01_L.jpg"),
        format!("{source_base}_02_R.jpg"),
    )
}

fn parse_page_number(value: &str) -> Result<i64, PipelineError> {
    value
        .parse::<i64>()
        .map_err(|_| PipelineError::PageNumberParse {
            value: value.to_string(),
        })
}
