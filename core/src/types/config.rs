/// Image normalization parameters
///
/// The defaults reproduce the layout the classifier was trained on: a
/// 12-bit detector range mapped to `[-100, 100]`, resampled to 224x224 and
/// replicated into three channels.
///
/// # Example
///
/// ```
/// use mammoprep_core::PreprocessConfig;
///
/// let config = PreprocessConfig::default().with_size(128);
///
/// assert_eq!(config.shape(), (3, 128, 128));
/// assert_eq!(config.median(), 2047.5);
/// assert_eq!(config.expected_min(), -100.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "json", derive(serde::Serialize, serde::Deserialize))]
pub struct PreprocessConfig {
    /// Output width and height
    pub size: usize,

    /// Number of identical channels in the output image
    pub channels: usize,

    /// Nominal maximum stored pixel value
    pub max_value: f32,

    /// Upper bound of the normalized range (the lower bound is its negation)
    pub expected_max: f32,

    /// Normalized values below this are floored to `expected_min()`
    pub filter_threshold: f32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            size: 224,
            channels: 3,
            max_value: 4095.0,
            expected_max: 100.0,
            filter_threshold: -90.0,
        }
    }
}

impl PreprocessConfig {
    /// Builder: Set output width/height
    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    /// Builder: Set channel count
    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    /// Builder: Set nominal maximum pixel value
    pub fn with_max_value(mut self, max_value: f32) -> Self {
        self.max_value = max_value;
        self
    }

    /// Builder: Set floor threshold
    pub fn with_filter_threshold(mut self, threshold: f32) -> Self {
        self.filter_threshold = threshold;
        self
    }

    /// Midpoint of the stored pixel range; maps to 0 after normalization
    pub fn median(&self) -> f32 {
        self.max_value / 2.0
    }

    /// Lower bound of the normalized range
    pub fn expected_min(&self) -> f32 {
        -self.expected_max
    }

    /// Output array shape as (channels, height, width)
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.channels, self.size, self.size)
    }

    /// Number of f32 values in one output image
    pub fn image_len(&self) -> usize {
        self.channels * self.size * self.size
    }

    /// Checks that the parameters describe a usable transform
    pub fn validate(&self) -> Result<(), String> {
        if self.size == 0 {
            return Err("size must be positive".to_string());
        }
        if self.channels == 0 {
            return Err("channels must be positive".to_string());
        }
        if !(self.max_value > 0.0) {
            return Err(format!("max_value must be positive, got {}", self.max_value));
        }
        if !(self.expected_max > 0.0) {
            return Err(format!(
                "expected_max must be positive, got {}",
                self.expected_max
            ));
        }
        Ok(())
    }
}
