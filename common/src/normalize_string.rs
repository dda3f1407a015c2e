pub trait NormalizeString {
    /// Converts `\r\n` and lone `\r` to `\n` and guarantees a trailing `\n`.
    fn normalize(&self) -> String;
}

impl NormalizeString for str {
    fn normalize(&self) -> String {
        let mut out = if self.contains('\r') {
            self.replace("\r\n", "\n").replace('\r', "\n")
        } else {
            self.to_string()
        };

        if !out.ends_with('\n') {
            out.push('\n');
        }
        out
    }
}

impl NormalizeString for String {
    fn normalize(&self) -> String {
        self.as_str().normalize()
    }
}
