/// Read access to a row-major single-plane raster.
pub trait ImageView {
    type Pixel: Copy;

    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn stride(&self) -> usize;

    fn row(&self, y: usize) -> &[Self::Pixel];

    fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Gather column `x` top to bottom.
    fn column(&self, x: usize) -> Vec<Self::Pixel> {
        (0..self.height()).map(|y| self.row(y)[x]).collect()
    }

    fn as_slice(&self) -> Option<&[Self::Pixel]> {
        None
    }
}

pub trait ImageViewMut: ImageView {
    fn row_mut(&mut self, y: usize) -> &mut [Self::Pixel];
}
