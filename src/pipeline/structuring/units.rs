/// Canonical spelling of a unit as it appears in lab reports.
/// Unknown units come back trimmed but otherwise untouched.
pub fn normalize_unit(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches(['.', ',', ';', ':']);
    let lower = trimmed.to_lowercase().replace('μ', "µ");

    let canonical = match lower.as_str() {
        "mg/dl" => "mg/dL",
        "g/dl" => "g/dL",
        "g/l" => "g/L",
        "mmol/l" => "mmol/L",
        "mmol/mol" => "mmol/mol",
        "µmol/l" | "umol/l" => "µmol/L",
        "mmhg" | "mm hg" => "mmHg",
        "kg/m2" | "kg/m²" | "kg/m^2" => "kg/m²",
        "%" => "%",
        "miu/l" => "mIU/L",
        "µiu/ml" | "uiu/ml" => "µIU/mL",
        "ng/ml" => "ng/mL",
        "nmol/l" => "nmol/L",
        "pg/ml" => "pg/mL",
        "pmol/l" => "pmol/L",
        _ => return trimmed.to_string(),
    };
    canonical.to_string()
}
