// Qualitative colour palette for series and pie slices

/// Pastel qualitative sequence (light, low-saturation hues)
pub const PASTEL: [&str; 11] = [
    "#66C5CC", "#F6CF71", "#F89C74", "#DCB0F2", "#87C55F", "#9EB9F3", "#FE88B1", "#C9DB74",
    "#8BE0A4", "#B497E7", "#B3B3B3",
];

/// Color palette for categorical data
#[derive(Debug, Clone)]
pub struct ColorPalette {
    colors: Vec<String>,
}

impl ColorPalette {
    /// The fixed pastel palette every chart uses
    pub fn pastel() -> Self {
        ColorPalette {
            colors: PASTEL.iter().map(|c| c.to_string()).collect(),
        }
    }

    pub fn colors(&self) -> &[String] {
        &self.colors
    }

    /// Get color for a specific index (wraps around if index > palette size)
    pub fn get_color(&self, index: usize) -> String {
        self.colors[index % self.colors.len()].clone()
    }

    /// Colors for `count` consecutive items, in order
    pub fn assign(&self, count: usize) -> Vec<String> {
        (0..count).map(|i| self.get_color(i)).collect()
    }
}
