// Only Tektronix MSO4/5/6 series oscilloscopes are supported for now.  Drivers are generic over
// the SCPI transport so they can be exercised without hardware

pub mod tek_mso;
