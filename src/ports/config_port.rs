//! Configuration access ports.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;
    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool;
}

pub trait ConfigWriter {
    fn set_string(&mut self, section: &str, key: &str, value: &str);

    fn set_int(&mut self, section: &str, key: &str, value: i64) {
        self.set_string(section, key, &value.to_string());
    }

    fn set_double(&mut self, section: &str, key: &str, value: f64) {
        self.set_string(section, key, &value.to_string());
    }

    fn set_bool(&mut self, section: &str, key: &str, value: bool) {
        self.set_string(section, key, if value { "true" } else { "false" });
    }
}
