// SPDX-License-Identifier: Apache-2.0 OR MIT
// Logging macros taking format arguments

/// Log a message with emergency severity
///
/// # Examples
/// ```ignore
/// log_emergency!(logger, Facility::Ingress, "rx_one failed on device {}", devid);
/// ```
#[macro_export]
macro_rules! log_emergency {
    ($logger:expr, $facility:expr, $($arg:tt)+) => {
        $logger.emergency($facility, &format!($($arg)+))
    };
}

/// Log a message with critical severity
#[macro_export]
macro_rules! log_critical {
    ($logger:expr, $facility:expr, $($arg:tt)+) => {
        $logger.critical($facility, &format!($($arg)+))
    };
}

/// Log a message with error severity
///
/// # Examples
/// ```ignore
/// log_error!(logger, Facility::Pipeline, "element {} failed to initialize", name);
/// ```
#[macro_export]
macro_rules! log_error {
    ($logger:expr, $facility:expr, $($arg:tt)+) => {
        $logger.error($facility, &format!($($arg)+))
    };
}

/// Log a message with warning severity
#[macro_export]
macro_rules! log_warning {
    ($logger:expr, $facility:expr, $($arg:tt)+) => {
        $logger.warning($facility, &format!($($arg)+))
    };
}

/// Log a message with notice severity
#[macro_export]
macro_rules! log_notice {
    ($logger:expr, $facility:expr, $($arg:tt)+) => {
        $logger.notice($facility, &format!($($arg)+))
    };
}

/// Log a message with info severity
///
/// # Examples
/// ```ignore
/// log_info!(logger, Facility::Controller, "instance {} running", id);
/// ```
#[macro_export]
macro_rules! log_info {
    ($logger:expr, $facility:expr, $($arg:tt)+) => {
        $logger.info($facility, &format!($($arg)+))
    };
}

/// Log a message with debug severity
#[macro_export]
macro_rules! log_debug {
    ($logger:expr, $facility:expr, $($arg:tt)+) => {
        $logger.debug($facility, &format!($($arg)+))
    };
}

/// Log a message with trace severity
#[macro_export]
macro_rules! log_trace {
    ($logger:expr, $facility:expr, $($arg:tt)+) => {
        $logger.trace($facility, &format!($($arg)+))
    };
}

/// Log a message with key-value pairs
///
/// # Examples
/// ```ignore
/// log_kv!(logger, Severity::Info, Facility::Device, "Device configured",
///         "dev" => "0", "queues" => "1/1");
/// ```
#[macro_export]
macro_rules! log_kv {
    ($logger:expr, $severity:expr, $facility:expr, $msg:expr, $($key:expr => $value:expr),+) => {{
        let kvs: &[(&str, &str)] = &[$(($key, $value)),+];
        $logger.log_kv($severity, $facility, $msg, kvs)
    }};
}
