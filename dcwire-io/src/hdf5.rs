//! HDF5 output container.
//!
//! Layout:
//!
//! ```text
//! /                      attr dcwire_format_version, sources
//! /overview              attr NX_class = "NXcollection"
//! /overview/<name>       u64 counts, flow bins included
//!                        1-D: [x_bins + 2]; 2-D: [y_bins + 2, x_bins + 2]
//!                        attrs kind, x_bins, x_min, x_max, (y_bins, y_min, y_max), entries
//! ```

use crate::output::{Overview, FORMAT_VERSION, OVERVIEW_GROUP};
use crate::{Error, Result};
use dcwire_core::{Axis, Hist1D, Hist2D, Histogram, HistogramRef, OccupancyHistograms};
use hdf5::types::{H5Type, VarLenUnicode};
use hdf5::{Dataset, File, Group, Location};
use ndarray::{ArrayView, ArrayView1};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Writer for the HDF5 container.
pub struct Hdf5OverviewWriter {
    file: File,
    path: PathBuf,
}

impl Hdf5OverviewWriter {
    /// Creates (truncates) the output file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(&path)?;
        set_attr_str(&file, "dcwire_format_version", FORMAT_VERSION)?;
        Ok(Self {
            file,
            path: path.as_ref().to_path_buf(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes every histogram of the grid and closes the file.
    ///
    /// # Errors
    /// Returns an error if HDF5 I/O fails.
    pub fn write(self, grid: &OccupancyHistograms, sources: &[String]) -> Result<()> {
        set_attr_str_array(&self.file, "sources", sources)?;

        let group = self.file.create_group(OVERVIEW_GROUP)?;
        set_attr_str(&group, "NX_class", "NXcollection")?;
        for histogram in grid.histograms() {
            match histogram {
                HistogramRef::H1(h) => write_hist1d(&group, h)?,
                HistogramRef::H2(h) => write_hist2d(&group, h)?,
            }
        }
        self.file.flush()?;
        Ok(())
    }
}

fn write_hist1d(group: &Group, hist: &Hist1D) -> Result<()> {
    let dataset = create_fixed_dataset::<u64, _>(group, hist.name(), (hist.axis().cells(),))?;
    dataset.write(ArrayView1::from(hist.counts()))?;
    set_attr_str(&dataset, "kind", "h1")?;
    set_axis_attrs(&dataset, "x", hist.axis())?;
    set_attr_scalar(&dataset, "entries", &hist.entries())?;
    set_dataset_units(&dataset, "count")
}

fn write_hist2d(group: &Group, hist: &Hist2D) -> Result<()> {
    let shape = (hist.y_axis().cells(), hist.x_axis().cells());
    let dataset = create_fixed_dataset::<u64, _>(group, hist.name(), shape)?;
    let view = ArrayView::from_shape(shape, hist.counts()).map_err(|e| {
        Error::InvalidFormat(format!("{}: counts shape mismatch: {e}", hist.name()))
    })?;
    dataset.write(view)?;
    set_attr_str(&dataset, "kind", "h2")?;
    set_axis_attrs(&dataset, "x", hist.x_axis())?;
    set_axis_attrs(&dataset, "y", hist.y_axis())?;
    set_attr_scalar(&dataset, "entries", &hist.entries())?;
    set_dataset_units(&dataset, "count")
}

/// Reads the overview group of an HDF5 container.
///
/// Histograms come back in name order.
///
/// # Errors
/// Returns an error if HDF5 I/O fails or a dataset lacks its axis attributes.
pub fn read_overview_hdf5<P: AsRef<Path>>(path: P) -> Result<Overview> {
    let file = File::open(path)?;
    let format_version = read_attr_opt_string(&file, "dcwire_format_version")?
        .ok_or_else(|| Error::InvalidFormat("missing dcwire_format_version".to_string()))?;
    let sources = read_attr_opt_string_array(&file, "sources")?.unwrap_or_default();

    let group = file.group(OVERVIEW_GROUP)?;
    let mut names = group.member_names()?;
    names.sort();

    let histograms = names
        .iter()
        .map(|name| read_histogram(&group.dataset(name)?, name))
        .collect::<Result<Vec<_>>>()?;

    Ok(Overview {
        format_version,
        sources,
        histograms,
    })
}

fn read_histogram(dataset: &Dataset, name: &str) -> Result<Histogram> {
    let kind = read_attr_opt_string(dataset, "kind")?.unwrap_or_default();
    let counts = dataset.read_raw::<u64>()?;
    match kind.as_str() {
        "h1" => {
            let axis = read_axis(dataset, "x")?;
            Ok(Histogram::H1(Hist1D::from_parts(name, axis, counts)?))
        }
        "h2" => {
            let x = read_axis(dataset, "x")?;
            let y = read_axis(dataset, "y")?;
            Ok(Histogram::H2(Hist2D::from_parts(name, x, y, counts)?))
        }
        other => Err(Error::InvalidFormat(format!(
            "dataset {name} has unknown histogram kind '{other}'"
        ))),
    }
}

fn create_fixed_dataset<T: H5Type, S>(group: &Group, name: &str, shape: S) -> Result<Dataset>
where
    S: Into<hdf5::Extents>,
{
    Ok(group.new_dataset::<T>().shape(shape).create(name)?)
}

fn set_axis_attrs(dataset: &Dataset, prefix: &str, axis: &Axis) -> Result<()> {
    set_attr_scalar(dataset, &format!("{prefix}_bins"), &(axis.bins() as u64))?;
    set_attr_scalar(dataset, &format!("{prefix}_min"), &axis.min())?;
    set_attr_scalar(dataset, &format!("{prefix}_max"), &axis.max())
}

fn read_axis(dataset: &Dataset, prefix: &str) -> Result<Axis> {
    let missing = |what: &str| {
        Error::InvalidFormat(format!("dataset {} lacks {prefix}_{what}", dataset.name()))
    };
    let bins = read_attr_opt::<u64>(dataset, &format!("{prefix}_bins"))?
        .ok_or_else(|| missing("bins"))?;
    let min = read_attr_opt::<f64>(dataset, &format!("{prefix}_min"))?
        .ok_or_else(|| missing("min"))?;
    let max = read_attr_opt::<f64>(dataset, &format!("{prefix}_max"))?
        .ok_or_else(|| missing("max"))?;
    let bins = usize::try_from(bins).map_err(|_| missing("bins"))?;
    Ok(Axis::new(bins, min, max))
}

fn set_attr_scalar<T: H5Type>(location: &Location, name: &str, value: &T) -> Result<()> {
    location.new_attr::<T>().create(name)?.write_scalar(value)?;
    Ok(())
}

fn set_dataset_units(dataset: &Dataset, units: &str) -> Result<()> {
    set_attr_str(dataset, "units", units)
}

fn set_attr_str(location: &Location, name: &str, value: &str) -> Result<()> {
    let value = to_var_len_unicode(value)?;
    location
        .new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}

fn set_attr_str_array(location: &Location, name: &str, values: &[String]) -> Result<()> {
    let values: Vec<VarLenUnicode> = values
        .iter()
        .map(|v| to_var_len_unicode(v))
        .collect::<Result<Vec<_>>>()?;
    let attr = location
        .new_attr::<VarLenUnicode>()
        .shape((values.len(),))
        .create(name)?;
    attr.write(ArrayView1::from(values.as_slice()))?;
    Ok(())
}

fn read_attr_opt<T: H5Type + Clone>(location: &Location, name: &str) -> Result<Option<T>> {
    match location.attr(name) {
        Ok(attr) => Ok(Some(attr.read_scalar::<T>()?)),
        Err(_) => Ok(None),
    }
}

fn read_attr_opt_string(location: &Location, name: &str) -> Result<Option<String>> {
    match location.attr(name) {
        Ok(attr) => {
            let value: VarLenUnicode = attr.read_scalar()?;
            Ok(Some(value.to_string()))
        }
        Err(_) => Ok(None),
    }
}

fn read_attr_opt_string_array(location: &Location, name: &str) -> Result<Option<Vec<String>>> {
    match location.attr(name) {
        Ok(attr) => {
            let values = attr.read_raw::<VarLenUnicode>()?;
            Ok(Some(values.iter().map(ToString::to_string).collect()))
        }
        Err(_) => Ok(None),
    }
}

fn to_var_len_unicode(value: &str) -> Result<VarLenUnicode> {
    VarLenUnicode::from_str(value)
        .map_err(|e| Error::InvalidFormat(format!("invalid utf-8 attribute: {e}")))
}
