use num_format::{Locale, ToFormattedString};

/// Text builder for fixed-width report tables
pub struct StatsReport {
    pub output: String,
    pub flops_divisor: f64,
    pub identation: String,
    pub label_width: usize,
}

impl Default for StatsReport {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsReport {
    pub fn new() -> Self {
        Self {
            output: String::new(),
            flops_divisor: 1.0,
            identation: String::new(),
            label_width: 20,
        }
    }

    pub fn set_total_flops(&mut self, value: u64) {
        self.flops_divisor = value.max(1) as f64 / 100.0;
    }
    pub fn set_identation(&mut self, level: usize) {
        self.identation =
            if level == 0 { String::new() } else { format!("|{}", " ".repeat(level * 4)) };
    }
    pub fn set_label_width(&mut self, width: usize) {
        self.label_width = width;
    }

    pub fn add(&mut self, text: &str) {
        self.output += text;
    }
    pub fn add_value(&mut self, label: &str, value: &str) {
        self.output += &format!(
            "{}{:<label_width$} {:>15}\n",
            self.identation,
            label,
            value,
            label_width = self.label_width
        );
    }
    pub fn add_count(&mut self, label: &str, count: u64) {
        self.add_value(label, &count.to_formatted_string(&Locale::en));
    }
    pub fn title(&mut self, label: &str) {
        self.output += &format!(
            "\n{identation}{label}\n{identation}{}\n",
            "=".repeat(label.len()),
            identation = self.identation,
        );
    }

    fn line_from_title(&mut self, title: &str) {
        self.output += &format!(
            "\n{identation}{title}\n{identation}{}\n",
            &"-".repeat(title.len()),
            identation = self.identation,
        );
    }

    pub fn title_count_flops_perc(&mut self, label: &str, count_label: &str, flops_label: &str) {
        self.line_from_title(&format!(
            "{label:<label_width$} {count_label:>15} {flops_label:>15}       %",
            label_width = self.label_width,
        ));
    }

    pub fn add_count_flops_perc(&mut self, label: &str, count: u64, flops: u64, comment: &str) {
        self.output += &format!(
            "{}{:<label_width$} {:>15} {:>15} {:6.2}%{comment}\n",
            self.identation,
            label,
            count.to_formatted_string(&Locale::en),
            flops.to_formatted_string(&Locale::en),
            flops as f64 / self.flops_divisor,
            label_width = self.label_width,
        );
    }

    pub fn title_form_table(&mut self) {
        self.line_from_title(&format!(
            "{:<label_width$} {:<10} {:<12} {:>15} {:>15} {:>3} {:>3} {:>3} {:>3} OPERANDS",
            "IFORM",
            "CATEGORY",
            "EXTENSION",
            "COUNT",
            "FLOPS",
            "FMA",
            "SCL",
            "MSK",
            "#OP",
            label_width = self.label_width,
        ));
    }

    #[allow(clippy::too_many_arguments)]
    pub fn add_form_row(
        &mut self,
        iform: &str,
        category: &str,
        extension: &str,
        count: u64,
        flops: u64,
        flags: [bool; 3],
        operands: &[String],
    ) {
        let flag = |set: bool| if set { "x" } else { "-" };
        self.output += &format!(
            "{}{:<label_width$} {:<10} {:<12} {:>15} {:>15} {:>3} {:>3} {:>3} {:>3} {}\n",
            self.identation,
            iform,
            category,
            extension,
            count.to_formatted_string(&Locale::en),
            flops.to_formatted_string(&Locale::en),
            flag(flags[0]),
            flag(flags[1]),
            flag(flags[2]),
            operands.len(),
            operands.join(" "),
            label_width = self.label_width,
        );
    }

    pub fn ln(&mut self) {
        self.output += "\n";
    }

    pub fn add_separator(&mut self) {
        self.output += &format!(
            "{}------------------------------------------------------------\n",
            self.identation
        );
    }
}
